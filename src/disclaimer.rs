use crate::config::DisclaimerConfig;

/// Fixed notice appended to every successful generation.
///
/// The suffix is `delimiter + body`. `strip` only removes text that ends with
/// that whole suffix, so `strip(append(x)) == x` for any `x`, even when the
/// body itself contains the delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disclaimer {
    delimiter: String,
    body: String,
}

impl Disclaimer {
    pub fn new(delimiter: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            body: body.into(),
        }
    }

    pub fn from_config(cfg: &DisclaimerConfig) -> Self {
        Self::new(cfg.delimiter.clone(), cfg.body.clone())
    }

    pub fn suffix(&self) -> String {
        format!("{}{}", self.delimiter, self.body)
    }

    pub fn append(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.delimiter.len() + self.body.len());
        out.push_str(text);
        out.push_str(&self.delimiter);
        out.push_str(&self.body);
        out
    }

    /// Remove the trailing disclaimer if present; text without it comes back untouched
    pub fn strip<'a>(&self, text: &'a str) -> &'a str {
        text.strip_suffix(self.suffix().as_str()).unwrap_or(text)
    }

    pub fn is_present(&self, text: &str) -> bool {
        text.ends_with(&self.suffix())
    }
}
