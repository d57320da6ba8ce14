use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;

/// A validated catalog code.
///
/// Codes are trimmed and normalised to uppercase. After normalisation they
/// must be non-empty and contain only ASCII letters, digits, `_` or `.`.
///
/// Subject codes are scoped to a program; offering codes (the registrar's
/// identifier for an offering) are global.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code(NonEmptyString);

impl Code {
    /// Creates a new `Code` from a string, normalising it to uppercase.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCodeError`] if the trimmed string is empty or contains
    /// characters other than ASCII alphanumerics, `_` and `.`.
    pub fn new(s: impl AsRef<str>) -> Result<Self, InvalidCodeError> {
        let raw = s.as_ref();
        let normalised = raw.trim().to_uppercase();

        if !normalised
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '.')
        {
            return Err(InvalidCodeError(raw.to_string()));
        }

        NonEmptyString::new(normalised)
            .map(Self)
            .map_err(|_| InvalidCodeError(raw.to_string()))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Code {
    type Error = InvalidCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Code {
    type Error = InvalidCodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Code {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Code {
    type Err = InvalidCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error returned when a string is not a valid catalog code.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error(
    "Invalid code '{0}': must be non-empty and contain only letters, digits, '_' or '.'"
)]
pub struct InvalidCodeError(String);

/// A reference to a subject by code, optionally qualified by program name.
///
/// Format: `CODE` or `PROGRAM/CODE`. The program part is matched against
/// program names exactly (after trimming), so it may contain spaces.
///
/// # Examples
///
/// ```
/// use prereqs::domain::SubjectRef;
///
/// let bare: SubjectRef = "gal1".parse().unwrap();
/// assert_eq!(bare.code().as_str(), "GAL1");
/// assert!(bare.program().is_none());
///
/// let qualified: SubjectRef = "Computer Engineering/GAL1".parse().unwrap();
/// assert_eq!(qualified.program(), Some("Computer Engineering"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    program: Option<String>,
    code: Code,
}

impl SubjectRef {
    /// Creates a reference with no program qualifier.
    #[must_use]
    pub const fn bare(code: Code) -> Self {
        Self {
            program: None,
            code,
        }
    }

    /// Creates a reference qualified by program name.
    #[must_use]
    pub fn qualified(program: impl Into<String>, code: Code) -> Self {
        Self {
            program: Some(program.into()),
            code,
        }
    }

    /// The program qualifier, if any.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }

    /// The subject code.
    #[must_use]
    pub const fn code(&self) -> &Code {
        &self.code
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.program {
            Some(program) => write!(f, "{program}/{}", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Errors that can occur when parsing a [`SubjectRef`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubjectRefError {
    /// The program qualifier was empty (`/CODE`).
    #[error("Invalid subject reference '{0}': empty program name")]
    EmptyProgram(String),

    /// The code part was invalid.
    #[error(transparent)]
    Code(#[from] InvalidCodeError),
}

impl FromStr for SubjectRef {
    type Err = SubjectRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('/') {
            Some((program, code)) => {
                let program = program.trim();
                if program.is_empty() {
                    return Err(SubjectRefError::EmptyProgram(s.to_string()));
                }
                Ok(Self::qualified(program, Code::new(code)?))
            }
            None => Ok(Self::bare(Code::new(s)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("GAL1", "GAL1"; "already uppercase")]
    #[test_case("gal1", "GAL1"; "lowercase normalised")]
    #[test_case("  1020 ", "1020"; "trimmed numeric")]
    #[test_case("CDIV_2.1", "CDIV_2.1"; "underscore and dot")]
    fn code_normalises(input: &str, expected: &str) {
        assert_eq!(Code::new(input).unwrap().as_str(), expected);
    }

    #[test_case(""; "empty")]
    #[test_case("   "; "whitespace only")]
    #[test_case("GAL 1"; "inner space")]
    #[test_case("GAL-1"; "dash")]
    #[test_case("CÁLCULO"; "non ascii")]
    fn code_rejects(input: &str) {
        assert!(Code::new(input).is_err());
    }

    #[test]
    fn bare_subject_ref() {
        let reference: SubjectRef = "p1".parse().unwrap();
        assert!(reference.program().is_none());
        assert_eq!(reference.code().as_str(), "P1");
        assert_eq!(reference.to_string(), "P1");
    }

    #[test]
    fn qualified_subject_ref_keeps_program_name() {
        let reference: SubjectRef = "INGENIERÍA CIVIL/1020".parse().unwrap();
        assert_eq!(reference.program(), Some("INGENIERÍA CIVIL"));
        assert_eq!(reference.code().as_str(), "1020");
        assert_eq!(reference.to_string(), "INGENIERÍA CIVIL/1020");
    }

    #[test]
    fn empty_program_is_rejected() {
        assert_eq!(
            "/P1".parse::<SubjectRef>(),
            Err(SubjectRefError::EmptyProgram("/P1".to_string()))
        );
    }

    #[test]
    fn invalid_code_in_reference_is_rejected() {
        assert!(matches!(
            "PLAN/bad code".parse::<SubjectRef>(),
            Err(SubjectRefError::Code(_))
        ));
    }
}
