//!
//! Fixed-size collection of databases, selected by index.
//!

use crate::db::Database;

pub struct DatabaseSet {
    databases: Vec<Database>,
}

impl DatabaseSet {
    pub fn new(count: usize) -> Self {
        let databases = (0..count).map(|i| Database::new(i as i32)).collect();
        DatabaseSet { databases }
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn get(&self, index: usize) -> Option<&Database> {
        self.databases.get(index)
    }

    pub fn is_valid_index(&self, index: i64) -> bool {
        index >= 0 && (index as usize) < self.databases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_index() {
        let set = DatabaseSet::new(16);
        assert!(set.is_valid_index(0));
        assert!(set.is_valid_index(15));
        assert!(!set.is_valid_index(16));
        assert!(!set.is_valid_index(-1));
    }

    #[test]
    fn default_size_is_sixteen() {
        let set = DatabaseSet::new(16);
        assert_eq!(set.len(), 16);
    }
}
