//! Address candidates for reconnection
//!
//! A robot is usually reachable under more than one address (primary IP,
//! fallback IP, mDNS name). While disconnected the client tries one candidate
//! per poll, cycling through the list.

#[derive(Debug, Clone, Default)]
pub struct AddressCandidate {
    addresses: Vec<String>,
    cursor: usize,
}

impl AddressCandidate {
    /// Blank entries are dropped
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let addresses = addresses
            .into_iter()
            .map(Into::into)
            .map(|a: String| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        Self {
            addresses,
            cursor: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Candidate the next attempt will use
    pub fn current(&self) -> Option<&str> {
        self.addresses.get(self.cursor).map(String::as_str)
    }

    /// Take the current candidate and advance, wrapping around
    pub fn next_address(&mut self) -> Option<String> {
        let address = self.current()?.to_string();
        self.cursor = (self.cursor + 1) % self.addresses.len();
        Some(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_through_candidates() {
        let mut candidates = AddressCandidate::new(["10.0.0.2", " ", "robot.local"]);
        assert_eq!(candidates.current(), Some("10.0.0.2"));
        assert_eq!(candidates.next_address().as_deref(), Some("10.0.0.2"));
        assert_eq!(candidates.next_address().as_deref(), Some("robot.local"));
        assert_eq!(candidates.next_address().as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_empty() {
        let mut candidates = AddressCandidate::new(Vec::<String>::new());
        assert!(candidates.is_empty());
        assert_eq!(candidates.next_address(), None);
    }
}
