use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cabin {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub capacity: i32,
}

/// Body for creating or replacing a cabin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub capacity: i32,
}

impl Default for CabinInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            capacity: 1,
        }
    }
}

impl Cabin {
    pub fn display_capacity(&self) -> String {
        match self.capacity {
            1 => "1 person".to_string(),
            n => format!("{} people", n),
        }
    }
}
