/// Name generation for human-readable player identifiers
use markov_namegen::{CharacterChainGenerator, RandomTextGenerator};

/// Training data, short names that read well next to a score
const TRAINING_NAMES: &[&str] = &[
    "Alexey", "Vadim", "Pajitnov", "Gerasimov", "Brzustowski", "Ogawa", "Rogers", "Stein",
    "Yuri", "Misha", "Nikita", "Olga", "Katya", "Boris", "Ivan", "Sasha",
    "Kaori", "Hiro", "Yumi", "Daichi", "Rin", "Kenta", "Mei", "Sora",
    "Jonas", "Kristof", "Lena", "Marek", "Petra", "Tomas", "Vera", "Zora",
    "Block", "Stack", "Drop", "Shift", "Spin", "Tetra", "Line", "Combo",
];

fn create_name_generator() -> CharacterChainGenerator {
    CharacterChainGenerator::builder()
        .with_order(2)
        .with_prior(0.01)
        .train(TRAINING_NAMES.iter().copied())
        .build()
}

/// Generate a pronounceable random name
///
/// Names contain only alphanumeric characters so they can be used as a
/// keyexpr chunk.
pub fn generate_random_name() -> String {
    let mut generator = create_name_generator();

    loop {
        let name = generator.generate_one();
        if !name.is_empty() && name.len() <= 10 && name.chars().all(|c| c.is_alphanumeric()) {
            return name;
        }
    }
}

/// Generate a random name with a numeric suffix, like "Kenta_42"
pub fn generate_unique_name() -> String {
    let base_name = generate_random_name();
    let suffix: u16 = rand::random::<u16>() % 1000;
    format!("{}_{}", base_name, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_name() {
        let name = generate_random_name();
        assert!(!name.is_empty());
        assert!(name.len() <= 10);
        assert!(name.chars().all(|c| c.is_alphanumeric()));
    }

    #[test]
    fn test_generate_unique_name_format() {
        let name = generate_unique_name();
        let parts: Vec<&str> = name.split('_').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].chars().all(|c| c.is_alphanumeric()));
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
    }
}
