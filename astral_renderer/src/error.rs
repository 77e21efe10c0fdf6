// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Error returned when a request can never be satisfied by an atlas.
///
/// Exhausting a backing store is not an error: atlases grow their backing
/// and retry. An `Error` is a request that no amount of growth could serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    /// The non-exhaustive category describing this error.
    kind: ErrorKind,

    /// The requested amount (dimension, texel count, ...).
    requested: u32,

    /// The largest amount the atlas accepts.
    limit: u32,

    /// The allocator error behind an [`ErrorKind::Alloc`].
    alloc: Option<astral_alloc::Error>,
}

impl Error {
    /// The machine-readable category for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The requested amount that was rejected.
    pub fn requested(&self) -> u32 {
        self.requested
    }

    /// The largest amount the atlas accepts, in the units of [`Error::requested`].
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub(crate) fn shadow_map_too_large(requested: u32, limit: u32) -> Self {
        Self {
            kind: ErrorKind::ShadowMapTooLarge,
            requested,
            limit,
            alloc: None,
        }
    }

    pub(crate) fn too_many_texels(requested: u32, limit: u32) -> Self {
        Self {
            kind: ErrorKind::TooManyTexels,
            requested,
            limit,
            alloc: None,
        }
    }

    pub(crate) fn no_color_stops() -> Self {
        Self {
            kind: ErrorKind::NoColorStops,
            requested: 0,
            limit: 0,
            alloc: None,
        }
    }
}

impl From<astral_alloc::Error> for Error {
    fn from(err: astral_alloc::Error) -> Self {
        let (w, h) = err.requested();
        let (lw, lh) = err.limit();
        Self {
            kind: ErrorKind::Alloc,
            requested: w.max(h),
            limit: lw.min(lh),
            alloc: Some(err),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let requested = self.requested;
        let limit = self.limit;
        match self.kind {
            ErrorKind::ShadowMapTooLarge => write!(
                f,
                "shadow map dimension {requested} exceeds the atlas width {limit}"
            ),
            ErrorKind::TooManyTexels => write!(
                f,
                "{requested} color stop texels do not fit in a layer of width {limit}"
            ),
            ErrorKind::NoColorStops => write!(f, "a color stop sequence needs at least one stop"),
            ErrorKind::Alloc => match &self.alloc {
                Some(err) => write!(f, "image allocation failed: {err}"),
                None => write!(f, "image allocation failed"),
            },
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.alloc
            .as_ref()
            .map(|err| err as &(dyn core::error::Error + 'static))
    }
}

/// The non-exhaustive category of an [`Error`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A shadow map was requested that is wider than the shadow map backing.
    ShadowMapTooLarge,

    /// An explicit texel count exceeds the color stop backing's layer width.
    TooManyTexels,

    /// A color stop sequence was requested without any stops.
    NoColorStops,

    /// The tile allocator rejected an image, see [`core::error::Error::source`].
    Alloc,
}
