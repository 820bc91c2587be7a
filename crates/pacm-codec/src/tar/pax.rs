//! PAX extended header records.
//!
//! Record format: `"<len> <key>=<value>\n"`, where `<len>` is the
//! decimal byte count of the *entire* record (its own digits included).

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PaxOverrides {
    pub path: Option<String>,
    pub linkpath: Option<String>,
    pub size: Option<u64>,
    pub uid: Option<u64>,
    pub gid: Option<u64>,
    pub mtime: Option<f64>,
    pub atime: Option<f64>,
    pub ctime: Option<f64>,
    pub other: HashMap<String, String>,
}

impl PaxOverrides {
    pub fn apply_record(&mut self, key: &str, value: &str) {
        match key {
            "path" => self.path = Some(value.to_string()),
            "linkpath" => self.linkpath = Some(value.to_string()),
            "size" => self.size = value.parse().ok(),
            "uid" => self.uid = value.parse().ok(),
            "gid" => self.gid = value.parse().ok(),
            "mtime" => self.mtime = value.parse().ok(),
            "atime" => self.atime = value.parse().ok(),
            "ctime" => self.ctime = value.parse().ok(),
            _ => {
                self.other.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn merge(&mut self, other: PaxOverrides) {
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.linkpath.is_some() {
            self.linkpath = other.linkpath;
        }
        if other.size.is_some() {
            self.size = other.size;
        }
        if other.uid.is_some() {
            self.uid = other.uid;
        }
        if other.gid.is_some() {
            self.gid = other.gid;
        }
        if other.mtime.is_some() {
            self.mtime = other.mtime;
        }
        if other.atime.is_some() {
            self.atime = other.atime;
        }
        if other.ctime.is_some() {
            self.ctime = other.ctime;
        }
        self.other.extend(other.other);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Parse the body of a PAX extended-header entry into overrides.
#[must_use]
pub fn parse_records(body: &[u8]) -> PaxOverrides {
    let mut overrides = PaxOverrides::default();
    let mut rest = body;
    while !rest.is_empty() {
        // "<len> " prefix: scan digits until the first space.
        let Some(space_pos) = rest.iter().position(|&b| b == b' ') else {
            break;
        };
        let Ok(len_str) = std::str::from_utf8(&rest[..space_pos]) else {
            break;
        };
        let Ok(record_len) = len_str.parse::<usize>() else {
            break;
        };
        if record_len == 0 || record_len > rest.len() {
            break;
        }
        let record = &rest[..record_len];
        // record = "<len> <key>=<value>\n"
        let after_len = &record[len_str.len() + 1..];
        let body_no_newline = after_len.strip_suffix(b"\n").unwrap_or(after_len);
        if let Some(eq_pos) = body_no_newline.iter().position(|&b| b == b'=') {
            let key = String::from_utf8_lossy(&body_no_newline[..eq_pos]).into_owned();
            let value = String::from_utf8_lossy(&body_no_newline[eq_pos + 1..]).into_owned();
            overrides.apply_record(&key, &value);
        }
        rest = &rest[record_len..];
    }
    overrides
}

/// Emit one PAX record, using fixpoint-length iteration.
///
/// A PAX record's own length digit count feeds back into the
/// length it declares.
#[must_use]
pub fn emit_record(key: &str, value: &str) -> Vec<u8> {
    let payload_len = key.len() + 1 + value.len() + 1; // "key=value\n"
    let mut len = payload_len + 2; // initial guess: " " + 1 digit
    loop {
        let digits = len.to_string().len();
        let new_len = digits + 1 + payload_len;
        if new_len == len {
            break;
        }
        len = new_len;
    }
    format!("{len} {key}={value}\n").into_bytes()
}
