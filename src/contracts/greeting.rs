// 👋 Parent1 / Parent2 / Child
//
// Two independent greeters with the same method name. Child holds one of each
// and resolves the clash explicitly by calling both.

pub const PARENT1_GREETING: &str = "Hello from Parent1";
pub const PARENT2_GREETING: &str = "Hello from Parent2";
pub const GREETING_SEPARATOR: &str = " + ";

pub trait Greeter {
    fn greeting(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parent1;

impl Greeter for Parent1 {
    fn greeting(&self) -> String {
        PARENT1_GREETING.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parent2;

impl Greeter for Parent2 {
    fn greeting(&self) -> String {
        PARENT2_GREETING.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Child {
    parent1: Parent1,
    parent2: Parent2,
}

impl Child {
    pub fn new() -> Self {
        Child::default()
    }

    pub fn parent1_greeting(&self) -> String {
        self.parent1.greeting()
    }

    pub fn parent2_greeting(&self) -> String {
        self.parent2.greeting()
    }

    /// "<Parent1> + <Parent2>"
    pub fn combined_greeting(&self) -> String {
        format!(
            "{}{}{}",
            self.parent1_greeting(),
            GREETING_SEPARATOR,
            self.parent2_greeting()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parents_are_independent() {
        assert_eq!(Parent1.greeting(), PARENT1_GREETING);
        assert_eq!(Parent2.greeting(), PARENT2_GREETING);
        assert_ne!(Parent1.greeting(), Parent2.greeting());
    }

    #[test]
    fn test_combined_greeting() {
        let child = Child::new();
        assert_eq!(
            child.combined_greeting(),
            "Hello from Parent1 + Hello from Parent2"
        );
    }

    #[test]
    fn test_combined_greeting_is_deterministic() {
        let a = Child::new();
        let b = Child::new();
        assert_eq!(a.combined_greeting(), b.combined_greeting());
        assert_eq!(a.combined_greeting(), a.combined_greeting());
    }
}
