//! Content hashing.
//!
//! A procedure is serialized field by field into SHA-256. Every field is
//! tagged and length-prefixed so adjacent fields cannot run into each other,
//! and every unordered collection is sorted before it is fed in.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::model::{IdentityHash, Procedure, Step, SubProcedure};
use crate::text::normalize_whitespace;

/// Digest over steps, sub-procedures and the sorted variation labels.
pub fn identity_hash(procedure: &Procedure) -> IdentityHash {
    let mut hasher = Sha256::new();
    feed_steps(&mut hasher, &procedure.steps);

    let labels: BTreeSet<&str> = procedure.variations.iter().map(|v| v.label.as_str()).collect();
    for label in labels {
        field(&mut hasher, b'L', label);
    }
    finish(hasher)
}

/// Digest over steps and sub-procedures only, ignoring variation labels.
///
/// Two procedures with equal content digests render the same text whatever
/// selections they were found under.
pub fn content_digest(procedure: &Procedure) -> IdentityHash {
    let mut hasher = Sha256::new();
    feed_steps(&mut hasher, &procedure.steps);
    finish(hasher)
}

fn finish(hasher: Sha256) -> IdentityHash {
    IdentityHash::from_hex(format!("{:x}", hasher.finalize()))
}

fn field(hasher: &mut Sha256, tag: u8, value: &str) {
    hasher.update([tag]);
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn feed_steps(hasher: &mut Sha256, steps: &[Step]) {
    for step in steps {
        field(hasher, b'T', step.title.trim());
        field(hasher, b'B', &normalize_whitespace(&step.body));
        for sub in &step.sub_procedures {
            feed_sub_procedure(hasher, sub);
        }
        // BTreeMap iterates in label order.
        for (label, content) in &step.variant_content {
            field(hasher, b'V', label);
            field(hasher, b'C', &normalize_whitespace(content));
        }
        if !step.nested_steps.is_empty() {
            hasher.update(b"N");
            feed_steps(hasher, &step.nested_steps);
            hasher.update(b"n");
        }
    }
}

fn feed_sub_procedure(hasher: &mut Sha256, sub: &SubProcedure) {
    field(hasher, b'S', sub.marker_type.as_str());
    for item in &sub.items {
        field(hasher, b'I', &normalize_whitespace(&item.text));
        for nested in &item.sub_procedures {
            feed_sub_procedure(hasher, nested);
        }
    }
    hasher.update(b"s");
}
