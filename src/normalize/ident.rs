use md5::{Digest, Md5};
use uuid::Uuid;

use crate::table::Cell;

/// Stable record id: MD5 of the phone cell's canonical representation,
/// laid out as a UUID. Absent phones hash the literal `nan`.
pub fn record_id(phone: Option<&Cell>) -> String {
    let digest = Md5::digest(canonical_repr(phone).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    Uuid::from_bytes(bytes).to_string()
}

/// Text is quoted and escaped, numbers are rendered bare, absent is `nan`.
/// Ids already stored depend on this exact rendering.
pub fn canonical_repr(cell: Option<&Cell>) -> String {
    match cell {
        None => "nan".to_string(),
        Some(Cell::Int(i)) => i.to_string(),
        Some(Cell::Float(x)) if x.is_nan() => "nan".to_string(),
        Some(Cell::Float(x)) => format!("{:?}", x),
        Some(Cell::Text(s)) => quote(s),
    }
}

fn quote(s: &str) -> String {
    let q = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(q);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == q => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(q);
    out
}
