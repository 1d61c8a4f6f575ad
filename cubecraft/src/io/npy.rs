//! NumPy `.npy` (format version 1.0) reading and writing of `f64` arrays.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array3, ArrayBase, Data, Dimension};

use super::NpyError;

const MAGIC: &[u8] = b"\x93NUMPY";
const VERSION: [u8; 2] = [1, 0];
/// Magic, version and header length field
const PREAMBLE_LEN: usize = 10;
const ALIGNMENT: usize = 64;

/// Header dictionary for a little-endian, C-ordered `f64` array, padded so the
/// data starts on a 64-byte boundary.
fn header(shape: &[usize]) -> String {
    let dims = if shape.len() == 1 {
        format!("({},)", shape[0])
    } else {
        let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
        format!("({})", dims.join(", "))
    };
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        dims
    );
    let unpadded = PREAMBLE_LEN + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');
    header
}

/// Write `array` to `path` in `.npy` format.
pub fn write_npy<S, D>(path: impl AsRef<Path>, array: &ArrayBase<S, D>) -> Result<(), NpyError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let header = header(array.shape());
    let header_len = u16::try_from(header.len())
        .map_err(|_| NpyError::Format(format!("header of {} bytes too long", header.len())))?;

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION)?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    // Logical iteration order is C order whatever the memory layout
    for value in array.iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_shape(header: &str) -> Result<Vec<usize>, NpyError> {
    let start = header
        .find("'shape': (")
        .ok_or_else(|| NpyError::Format("missing shape".to_string()))?
        + "'shape': (".len();
    let end = header[start..]
        .find(')')
        .ok_or_else(|| NpyError::Format("unterminated shape".to_string()))?
        + start;
    header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| NpyError::Format(format!("invalid dimension '{}'", s)))
        })
        .collect()
}

/// Read a 3D little-endian `f64` array written by [`write_npy`].
pub fn read_npy(path: impl AsRef<Path>) -> Result<Array3<f64>, NpyError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    if bytes.len() < PREAMBLE_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NpyError::Format("not an npy file".to_string()));
    }
    if bytes[6..8] != VERSION {
        return Err(NpyError::Format(format!(
            "unsupported version {}.{}",
            bytes[6], bytes[7]
        )));
    }
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let data_start = PREAMBLE_LEN + header_len;
    let header = bytes
        .get(PREAMBLE_LEN..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| NpyError::Format("truncated header".to_string()))?;
    if !header.contains("'descr': '<f8'") || !header.contains("'fortran_order': False") {
        return Err(NpyError::Format(format!("unsupported header {}", header.trim())));
    }

    let shape = parse_shape(header)?;
    let [n_v, n_y, n_x] = shape[..] else {
        return Err(NpyError::Format(format!("expected 3 dimensions, got {:?}", shape)));
    };
    let data = &bytes[data_start..];
    if data.len() != n_v * n_y * n_x * 8 {
        return Err(NpyError::Format(format!(
            "expected {} data bytes, got {}",
            n_v * n_y * n_x * 8,
            data.len()
        )));
    }
    let values: Vec<f64> = data
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    Array3::from_shape_vec((n_v, n_y, n_x), values)
        .map_err(|e| NpyError::Format(e.to_string()))
}
