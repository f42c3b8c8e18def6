//! Per-component boundary condition records for slope computation.

use serde::{Deserialize, Serialize};

/// What lies beyond a domain face.
///
/// `Interior` means valid data continues past the face (periodic wrap or a
/// surrounding coarser level), so centered stencils may cross it.
/// `External` means the face is a physical boundary: stencils switch to
/// one-sided differencing that stays inside the domain.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum BcKind {
    #[default]
    Interior,
    External,
}

/// Boundary kinds for the six domain faces, one record per component.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct BcRec {
    pub lo: [BcKind; 3],
    pub hi: [BcKind; 3],
}

impl BcRec {
    /// Interior on every face.
    pub fn interior() -> Self {
        Self::default()
    }

    /// External on every face.
    pub fn external() -> Self {
        BcRec {
            lo: [BcKind::External; 3],
            hi: [BcKind::External; 3],
        }
    }
}
