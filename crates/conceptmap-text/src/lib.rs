//! Text handling shared by the vocabulary index and the matching cascade.
//!
//! Everything that compares strings goes through [`normalize`], so a
//! vocabulary term and a corpus string are equal exactly when their
//! normalized forms are byte-identical. The other helpers prepare the raw
//! material that gets normalized:
//!
//! 1. [`segment_definition`] cuts a multi-sense definition field into
//!    [`CandidateDefinition`](conceptmap_types::CandidateDefinition)s.
//! 2. [`headword_variants`] expands a headword field into its spelling
//!    variants.
//! 3. [`strip_leading_determiners`] derives the bare form of a vocabulary
//!    term (`ein Bier` → `Bier`, `sich betrinken` → `betrinken`).
//!
//! # Example
//! ```rust
//! use conceptmap_text::{normalize, segment_definition};
//!
//! assert_eq!(normalize("  Schn&auml;pse &amp; Bier-Gl&auml;ser "), "schnapse bierglaser");
//!
//! let cands = segment_definition(0, "1. Trinkgefäß; 2. (großer) Krug, der überläuft");
//! let texts: Vec<_> = cands.iter().map(|c| c.normalized.as_str()).collect();
//! assert_eq!(texts, ["trinkgefass", "grosser krug der uberlauft"]);
//! ```

mod headword;
mod normalize;
mod segment;

pub use headword::{headword_variants, strip_leading_determiners};
pub use normalize::{is_single_token, normalize, token_count};
pub use segment::{RELATIVE_PRONOUNS, segment_definition, split_senses};
