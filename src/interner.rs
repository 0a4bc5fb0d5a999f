/// Lazily built name → index table. Indices are handed out in first-use order
/// and stay stable for the lifetime of the table; lookup is a linear scan,
/// which is fine at the scale of pass and shader-define names (authored
/// content, a handful of entries).
#[derive(Debug, Default)]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// Returns the index for `name`, appending it on first use.
    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            return idx;
        }
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    /// Index for an already interned name, without inserting.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_names_keep_their_index() {
        let mut table = NameTable::new();
        let main = table.intern("MAIN");
        let shadow = table.intern("SHADOW");
        assert_eq!(table.intern("MAIN"), main);
        assert_eq!(table.intern("SHADOW"), shadow);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn fresh_names_get_strictly_increasing_indices() {
        let mut table = NameTable::new();
        let mut last = table.intern("a");
        for name in ["b", "c", "d", "e"] {
            let idx = table.intern(name);
            assert_eq!(idx, last + 1);
            last = idx;
        }
    }

    #[test]
    fn independent_tables_do_not_share_indices() {
        let mut passes = NameTable::new();
        let mut defines = NameTable::new();
        assert_eq!(passes.intern("MAIN"), 0);
        assert_eq!(defines.intern("SKINNED"), 0);
        assert_eq!(passes.intern("SHADOW"), 1);
        assert_eq!(defines.intern("MAIN"), 1);
        assert_eq!(passes.intern("MAIN"), 0);
        assert_eq!(defines.intern("SKINNED"), 0);
    }

    #[test]
    fn reverse_lookup_round_trips() {
        let mut table = NameTable::new();
        let idx = table.intern("POINT_LIGHT");
        assert_eq!(table.name(idx), Some("POINT_LIGHT"));
        assert_eq!(table.lookup("POINT_LIGHT"), Some(idx));
        assert_eq!(table.name(idx + 1), None);
        assert_eq!(table.lookup("missing"), None);
    }
}
