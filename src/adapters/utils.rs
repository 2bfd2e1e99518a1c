//! Shared helpers for adapters that talk to C APIs.
//!
//! The vendor structs carry fixed-size, NUL-terminated byte buffers (SSID,
//! passphrase, NVS keys and namespaces).  These helpers convert between those
//! and Rust strings without ever writing past the buffer.

/// Copy `src` into `dst` as a NUL-terminated C string, truncating so the
/// terminator always fits.  Returns the number of bytes copied.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
pub(super) fn copy_nul_terminated(src: &str, dst: &mut [u8]) -> usize {
    dst.fill(0);
    let Some(room) = dst.len().checked_sub(1) else {
        return 0;
    };
    let n = src.len().min(room);
    dst[..n].copy_from_slice(&src.as_bytes()[..n]);
    n
}

/// Borrow the UTF-8 prefix of a NUL-terminated buffer.  Invalid UTF-8 is
/// cut at the first bad byte.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
pub(super) fn str_from_nul(buf: &[u8]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    match core::str::from_utf8(&buf[..end]) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&buf[..e.valid_up_to()]).unwrap_or_default(),
    }
}

/// Map an `esp_err_t` to a [`DriverError`](crate::error::DriverError).
#[cfg(target_os = "espidf")]
pub(super) fn esp_check(
    op: &'static str,
    ret: esp_idf_svc::sys::esp_err_t,
) -> Result<(), crate::error::DriverError> {
    if ret == esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t {
        Ok(())
    } else {
        Err(crate::error::DriverError::new(op, ret))
    }
}
