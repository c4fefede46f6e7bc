//! Configuration access port.

pub trait ConfigPort {
    /// Trimmed value of `key` in `section`. Absent or blank ⇒ `None`.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
}
