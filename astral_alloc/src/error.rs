// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Error returned when an allocation request violates an allocator's limits.
///
/// Running out of space is *not* an error; allocation functions report it by
/// returning `None`, after which the caller is expected to grow the allocator
/// and retry. An `Error` means no amount of growth can satisfy the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    requested: (u32, u32),
    limit: (u32, u32),
}

impl Error {
    /// The machine-readable category for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The size that was requested, as `(width, height)`.
    ///
    /// For [`ErrorKind::TileTooLarge`] these are log2 sizes.
    pub fn requested(&self) -> (u32, u32) {
        self.requested
    }

    /// The largest size the allocator accepts, in the same units as
    /// [`Error::requested`].
    pub fn limit(&self) -> (u32, u32) {
        self.limit
    }

    pub(crate) fn tile_too_large(requested: (u32, u32), limit: (u32, u32)) -> Self {
        Self {
            kind: ErrorKind::TileTooLarge,
            requested,
            limit,
        }
    }

    pub(crate) fn region_too_large(requested: (u32, u32), limit: (u32, u32)) -> Self {
        Self {
            kind: ErrorKind::RegionTooLarge,
            requested,
            limit,
        }
    }

    pub(crate) fn empty_request(requested: (u32, u32), limit: (u32, u32)) -> Self {
        Self {
            kind: ErrorKind::EmptyRequest,
            requested,
            limit,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (w, h) = self.requested;
        let (lw, lh) = self.limit;
        match self.kind {
            ErrorKind::TileTooLarge => write!(
                f,
                "log2 tile size {w}x{h} exceeds maximum log2 tile size {lw}x{lh}"
            ),
            ErrorKind::RegionTooLarge => {
                write!(f, "region size {w}x{h} exceeds maximum tile size {lw}x{lh}")
            }
            ErrorKind::EmptyRequest => write!(f, "cannot allocate an empty {w}x{h} region"),
        }
    }
}

impl core::error::Error for Error {}

/// The non-exhaustive category of an [`Error`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A tile was requested whose log2 size exceeds the allocator's maximum.
    TileTooLarge,

    /// A region was requested that is wider or taller than the maximum tile size.
    RegionTooLarge,

    /// A region with zero width or height was requested.
    EmptyRequest,
}
