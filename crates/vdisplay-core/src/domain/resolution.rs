//! Resolution catalog: predefined sizes addressable by id or name, plus
//! parsing of literal `WIDTHxHEIGHT` strings for custom sizes.

use std::fmt;

use thiserror::Error;

/// Errors raised while resolving a requested resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// The numeric id is not in the catalog.
    #[error("unknown resolution id {0} (valid ids are 1-{max})", max = CATALOG.len())]
    UnknownId(u32),

    /// The mnemonic name is not in the catalog (names are case-sensitive).
    #[error("unknown resolution name '{0}'")]
    UnknownName(String),

    /// The custom size is not of the form `<positive-int>x<positive-int>`.
    #[error("invalid size '{0}': expected WIDTHxHEIGHT, e.g. 1920x1080")]
    Format(String),

    /// A dimension exceeds what the display protocol can address.
    #[error("size '{0}' exceeds the maximum of {max} pixels per side", max = MAX_DIMENSION)]
    TooLarge(String),
}

/// Largest width, height or coordinate the display protocol can express.
pub const MAX_DIMENSION: u32 = 32767;

/// A concrete width × height pair, either from the catalog or custom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionSpec {
    /// Catalog id, `None` for custom sizes.
    pub id: Option<u32>,
    /// Catalog mnemonic, `None` for custom sizes.
    pub name: Option<&'static str>,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for ResolutionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One row of the predefined table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl CatalogEntry {
    fn to_spec(self) -> ResolutionSpec {
        ResolutionSpec {
            id: Some(self.id),
            name: Some(self.name),
            width: self.width,
            height: self.height,
        }
    }
}

/// The predefined resolutions, ordered by id.
pub const CATALOG: [CatalogEntry; 6] = [
    CatalogEntry { id: 1, name: "fhd", width: 1920, height: 1080 },
    CatalogEntry { id: 2, name: "hdplus", width: 1600, height: 900 },
    CatalogEntry { id: 3, name: "wxga", width: 1366, height: 768 },
    CatalogEntry { id: 4, name: "hd", width: 1280, height: 720 },
    CatalogEntry { id: 5, name: "qhd", width: 2560, height: 1440 },
    CatalogEntry { id: 6, name: "uhd", width: 3840, height: 2160 },
];

impl ResolutionSpec {
    /// Looks up a catalog entry by its numeric id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownId`] when `id` is not in the table.
    pub fn resolve_by_id(id: u32) -> Result<Self, CatalogError> {
        CATALOG
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.to_spec())
            .ok_or(CatalogError::UnknownId(id))
    }

    /// Looks up a catalog entry by its mnemonic name (exact, case-sensitive).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownName`] when no entry has that name.
    pub fn resolve_by_name(name: &str) -> Result<Self, CatalogError> {
        CATALOG
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.to_spec())
            .ok_or_else(|| CatalogError::UnknownName(name.to_string()))
    }

    /// Resolves a `-r` argument: all-digit tokens are ids, anything else is a name.
    ///
    /// # Errors
    ///
    /// Propagates [`CatalogError::UnknownId`] or [`CatalogError::UnknownName`].
    pub fn resolve(token: &str) -> Result<Self, CatalogError> {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            // Digits that overflow u32 can never be a valid id.
            let id = token
                .parse::<u32>()
                .map_err(|_| CatalogError::UnknownName(token.to_string()))?;
            Self::resolve_by_id(id)
        } else {
            Self::resolve_by_name(token)
        }
    }

    /// Parses a custom `WIDTHxHEIGHT` size.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Format`] unless the input is exactly two
    /// positive integers separated by a single `x`.
    pub fn parse_custom(input: &str) -> Result<Self, CatalogError> {
        let (width, height) =
            parse_dimensions(input).ok_or_else(|| CatalogError::Format(input.to_string()))?;
        if width == 0 || height == 0 {
            return Err(CatalogError::Format(input.to_string()));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(CatalogError::TooLarge(input.to_string()));
        }
        Ok(Self {
            id: None,
            name: None,
            width,
            height,
        })
    }
}

/// Splits `<digits>x<digits>` into its two numbers.
///
/// Signs, whitespace and empty halves are rejected.  Shared with the
/// position parser, which uses the same shape for `XxY` coordinates.
pub fn parse_dimensions(input: &str) -> Option<(u32, u32)> {
    let (w, h) = input.split_once('x')?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(w) || !digits(h) {
        return None;
    }
    Some((w.parse().ok()?, h.parse().ok()?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
