use crate::generator::Generator;

/// Length of the ids produced by [`RandomGenerator`].
pub const ID_LEN: usize = 6;

/// Generates short ids from six random bytes encoded as base58.
///
/// Only the first [`ID_LEN`] characters of the encoding are kept, so ids
/// can collide; the service retries with a fresh id when one does.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> String {
        let bytes: [u8; 6] = rand::random();
        let mut encoded = bs58::encode(bytes).into_string();
        encoded.truncate(ID_LEN);
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_fixed_length() {
        let generator = RandomGenerator::new();

        for _ in 0..1_000 {
            assert_eq!(generator.generate().len(), ID_LEN);
        }
    }

    #[test]
    fn ids_use_base58_alphabet() {
        let generator = RandomGenerator::new();

        for _ in 0..100 {
            let id = generator.generate();
            assert!(bs58::decode(&id).into_vec().is_ok(), "not base58: {id}");
            assert!(!id.contains(['0', 'O', 'I', 'l']));
        }
    }

    #[test]
    fn ids_differ_between_calls() {
        let generator = RandomGenerator::new();

        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| generator.generate()).collect();

        assert!(ids.len() > 90);
    }
}
