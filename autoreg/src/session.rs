use crate::errors::InputError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};

pub const PASSWORD_LENGTH: usize = 12;

/// Pools for identities the caller leaves unnamed.
pub const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Daniel", "Nancy", "Matthew", "Lisa", "Anthony", "Betty", "Mark",
    "Margaret", "Steven", "Sandra", "Paul", "Ashley", "Andrew", "Emily", "Joshua", "Donna",
    "Kevin", "Michelle", "Brian", "Carol", "George", "Amanda", "Edward", "Melissa", "Ronald",
    "Deborah", "Timothy", "Stephanie", "Jason", "Rebecca",
];
pub const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright",
    "Scott", "Torres", "Nguyen", "Hill", "Flores", "Green", "Adams", "Nelson", "Baker", "Hall",
    "Rivera", "Campbell", "Mitchell", "Carter", "Roberts",
];

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()_+-=";

/// Identity for one registration attempt. Fully populated at construction and
/// immutable afterwards.
#[derive(Clone)]
pub struct RegistrationSession {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    use_incognito: bool,
    work_dir: PathBuf,
}

impl std::fmt::Debug for RegistrationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationSession")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("use_incognito", &self.use_incognito)
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}

impl RegistrationSession {
    pub fn builder(email: impl Into<String>) -> RegistrationSessionBuilder {
        RegistrationSessionBuilder::new(email)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn use_incognito(&self) -> bool {
        self.use_incognito
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationSessionBuilder {
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    password: Option<String>,
    use_incognito: bool,
    work_dir: Option<PathBuf>,
}

impl RegistrationSessionBuilder {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            first_name: None,
            last_name: None,
            password: None,
            use_incognito: true,
            work_dir: None,
        }
    }

    pub fn first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    pub fn last_name(mut self, name: impl Into<String>) -> Self {
        self.last_name = Some(name.into());
        self
    }

    /// Use a fixed password instead of generating one.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn use_incognito(mut self, incognito: bool) -> Self {
        self.use_incognito = incognito;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<RegistrationSession, InputError> {
        let email = self.email.trim().to_string();
        if email.is_empty() {
            return Err(InputError::MissingEmail);
        }
        if !email.contains('@') {
            return Err(InputError::InvalidEmail(email));
        }

        let non_blank = |v: Option<String>, pool: &[&str]| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| random_name(pool))
        };

        Ok(RegistrationSession {
            email,
            password: self
                .password
                .unwrap_or_else(|| generate_password(PASSWORD_LENGTH)),
            first_name: non_blank(self.first_name, FIRST_NAMES),
            last_name: non_blank(self.last_name, LAST_NAMES),
            use_incognito: self.use_incognito,
            work_dir: self.work_dir.unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

fn random_name(pool: &[&str]) -> String {
    pool.choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("User")
        .to_string()
}

/// Random password with at least one character from each class.
pub fn generate_password(length: usize) -> String {
    let classes = [LOWER, UPPER, DIGITS, SPECIAL];
    let length = length.max(classes.len());
    let mut rng = rand::thread_rng();

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    let all: Vec<u8> = classes.concat();
    while chars.len() < length {
        chars.push(all[rng.gen_range(0..all.len())]);
    }
    chars.shuffle(&mut rng);
    chars.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults() {
        let session = RegistrationSession::builder("a@example.com").build().unwrap();
        assert!(FIRST_NAMES.contains(&session.first_name()));
        assert!(LAST_NAMES.contains(&session.last_name()));
        assert!(session.use_incognito());
        assert_eq!(session.password().len(), PASSWORD_LENGTH);
    }

    #[test]
    fn test_email_validation() {
        assert_eq!(
            RegistrationSession::builder("  ").build().unwrap_err(),
            InputError::MissingEmail
        );
        assert_eq!(
            RegistrationSession::builder("no-at-sign").build().unwrap_err(),
            InputError::InvalidEmail("no-at-sign".to_string())
        );
    }

    #[test]
    fn test_blank_names_fall_back() {
        let session = RegistrationSession::builder("a@example.com")
            .first_name("")
            .last_name("Lovelace")
            .build()
            .unwrap();
        assert!(FIRST_NAMES.contains(&session.first_name()));
        assert_eq!(session.last_name(), "Lovelace");
    }

    #[test]
    fn test_unnamed_sessions_draw_varied_names() {
        let names: std::collections::HashSet<String> = (0..40)
            .map(|_| {
                let session = RegistrationSession::builder("a@example.com").build().unwrap();
                format!("{} {}", session.first_name(), session.last_name())
            })
            .collect();
        assert!(names.len() > 1, "every unnamed session got {names:?}");
        assert!(names.iter().all(|n| !n.trim().is_empty()));
    }

    #[test]
    fn test_password_has_every_class() {
        for _ in 0..50 {
            let pw = generate_password(PASSWORD_LENGTH);
            assert_eq!(pw.len(), PASSWORD_LENGTH);
            assert!(pw.bytes().any(|b| LOWER.contains(&b)));
            assert!(pw.bytes().any(|b| UPPER.contains(&b)));
            assert!(pw.bytes().any(|b| DIGITS.contains(&b)));
            assert!(pw.bytes().any(|b| SPECIAL.contains(&b)));
        }
    }

    #[test]
    fn test_debug_hides_password() {
        let session = RegistrationSession::builder("a@example.com")
            .password("Secret#123abc")
            .build()
            .unwrap();
        assert!(!format!("{session:?}").contains("Secret#123abc"));
    }
}
