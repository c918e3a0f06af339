use std::time::{Duration, SystemTime};

/// Compose a short, mostly-unique ID from time, pid and a few random bytes.
/// Used as the disambiguating suffix of scratch directory names.
pub fn create_run_id() -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let pid = std::process::id() as u128;
    let mut rnd = [0u8; 8];
    let _ = getrandom::getrandom(&mut rnd);
    let mix = now.as_nanos() ^ pid ^ u128::from(u64::from_le_bytes(rnd));
    // base36 encode last 40 bits for brevity
    let mut v = (mix & 0xffffffffff) as u64;
    let mut s = String::new();
    let alphabet = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if v == 0 {
        s.push('0');
    } else {
        while v > 0 {
            let idx = (v % 36) as usize;
            s.push(alphabet[idx] as char);
            v /= 36;
        }
    }
    s.chars().rev().collect()
}
