use serde::{Deserialize, Serialize};

/// Ordered size codes used for fit-preference adjustments.
///
/// # Examples
///
/// ```
/// use sizewise::size_classifier::SizeLadder;
///
/// let ladder = SizeLadder::default();
/// assert_eq!(ladder.step_up("medium"), Some("medium+"));
/// assert_eq!(ladder.step_down("small-"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeLadder {
    codes: Vec<String>,
}

impl Default for SizeLadder {
    fn default() -> Self {
        Self::new(&["small-", "small", "small+", "medium", "medium+", "large", "large+"])
    }
}

impl SizeLadder {
    /// Ladder from smallest to largest.
    #[must_use]
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: codes.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    /// Codes, smallest first.
    #[must_use]
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Rung of a code.
    #[must_use]
    pub fn position(&self, code: &str) -> Option<usize> {
        self.codes.iter().position(|c| c == code)
    }

    /// Next larger code; `None` at the top or for unknown codes.
    #[must_use]
    pub fn step_up(&self, code: &str) -> Option<&str> {
        let pos = self.position(code)?;
        self.codes.get(pos + 1).map(String::as_str)
    }

    /// Next smaller code; `None` at the bottom or for unknown codes.
    #[must_use]
    pub fn step_down(&self, code: &str) -> Option<&str> {
        let pos = self.position(code)?;
        pos.checked_sub(1)
            .and_then(|p| self.codes.get(p))
            .map(String::as_str)
    }

    /// Sort key placing ladder codes in ladder order and unknown codes
    /// after them alphabetically.
    #[must_use]
    pub fn sort_key<'a>(&self, code: &'a str) -> (usize, &'a str) {
        (self.position(code).unwrap_or(usize::MAX), code)
    }
}
