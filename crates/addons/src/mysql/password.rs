use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";
pub const PASSWORD_LENGTH: usize = 16;

/// MySQL root 密码生成器，随机源由调用方注入
#[derive(Debug)]
pub struct PasswordGenerator {
    rng: Mutex<StdRng>,
}

impl PasswordGenerator {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_os_rng() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn generate(&self) -> String {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (0..PASSWORD_LENGTH)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect()
    }
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self::from_os_rng()
    }
}
