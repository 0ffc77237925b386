//! Core data model: compounds, molecules, atoms, and the edges between them.

mod atom;
mod compound;
mod edge;
mod ids;
mod molecule;

pub use atom::Atom;
pub use compound::{Compound, ContentHash};
pub use edge::Edge;
pub use ids::{normalize_atom_name, AtomId, CompoundId, MoleculeId};
pub use molecule::{Molecule, MoleculeType, Provenance};
