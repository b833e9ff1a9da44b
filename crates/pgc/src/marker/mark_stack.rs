//! Mark Stack - explicit worklist for one thread's mark
//!
//! Holds raw reference words still to be visited. Each heap is marked by a
//! single worker, so the stack is a plain `Vec` with a depth high-water mark.

/// MarkStack - LIFO worklist of reference words
#[derive(Debug, Default)]
pub struct MarkStack {
    items: Vec<usize>,
    max_depth: usize,
    pushed: usize,
}

impl MarkStack {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            max_depth: 0,
            pushed: 0,
        }
    }

    /// Push a word; null words are dropped
    #[inline]
    pub fn push(&mut self, word: usize) {
        if word == 0 {
            return;
        }
        self.items.push(word);
        self.pushed += 1;
        self.max_depth = self.max_depth.max(self.items.len());
    }

    /// Push every non-null word of `words`
    pub fn extend_from(&mut self, words: &[usize]) {
        for &word in words {
            self.push(word);
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Option<usize> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Deepest the stack has been
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Words pushed since creation
    pub fn pushed(&self) -> usize {
        self.pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_not_pushed() {
        let mut stack = MarkStack::with_capacity(4);
        stack.extend_from(&[0, 7, 0, 9]);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop(), Some(9));
        assert_eq!(stack.pop(), Some(7));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_max_depth_is_high_water_mark() {
        let mut stack = MarkStack::default();
        stack.push(1);
        stack.push(2);
        stack.pop();
        stack.push(3);
        stack.pop();
        stack.pop();
        assert_eq!(stack.max_depth(), 2);
        assert_eq!(stack.pushed(), 3);
    }
}
