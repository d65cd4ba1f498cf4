//! Injected identifier and invitation-code generation.

use rand::{rngs::OsRng, Rng};
use uuid::Uuid;

/// Generates entity identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Uuid;
}

/// Random v4 UUIDs, the production generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Generates human-shareable invitation codes.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Ambiguous glyphs (0/O, 1/I/L) are excluded so codes survive being read
/// aloud or retyped.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_GROUP_LEN: usize = 4;

/// Random invitation codes of the form `XXXX-XXXX`.
#[derive(Debug, Clone, Copy)]
pub struct InviteCodeGenerator {
    groups: usize,
}

impl InviteCodeGenerator {
    #[must_use]
    pub fn new(groups: usize) -> Self {
        Self {
            groups: groups.max(1),
        }
    }
}

impl Default for InviteCodeGenerator {
    fn default() -> Self {
        Self::new(2)
    }
}

impl CodeGenerator for InviteCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = OsRng;
        let mut code = String::with_capacity(self.groups * (CODE_GROUP_LEN + 1));
        for group in 0..self.groups {
            if group > 0 {
                code.push('-');
            }
            for _ in 0..CODE_GROUP_LEN {
                let index = rng.gen_range(0..CODE_ALPHABET.len());
                code.push(char::from(CODE_ALPHABET[index]));
            }
        }
        code
    }
}
