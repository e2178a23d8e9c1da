use proptest::prelude::*;

/// Shape of one registered operation: the value its callback returns and the
/// operations it registers while running
#[derive(Debug, Clone)]
pub struct TreeSpec {
    pub value: Option<i32>,
    pub children: Vec<TreeSpec>,
}

impl TreeSpec {
    pub fn leaf(value: i32) -> Self {
        Self {
            value: Some(value),
            children: Vec::new(),
        }
    }

    pub fn node(value: Option<i32>, children: Vec<TreeSpec>) -> Self {
        Self { value, children }
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeSpec::count).sum::<usize>()
    }

    /// Values in registration post-order
    pub fn post_order(&self, out: &mut Vec<i32>) {
        for child in &self.children {
            child.post_order(out);
        }
        if let Some(value) = self.value {
            out.push(value);
        }
    }
}

pub fn expected_results(forest: &[TreeSpec]) -> Vec<i32> {
    let mut out = Vec::new();
    for tree in forest {
        tree.post_order(&mut out);
    }
    out
}

/// Strategy for generating registration trees up to depth 4
pub fn tree_strategy() -> impl Strategy<Value = TreeSpec> {
    let leaf = prop::option::of(-1000i32..1000).prop_map(|value| TreeSpec {
        value,
        children: Vec::new(),
    });

    leaf.prop_recursive(4, 48, 4, |inner| {
        (
            prop::option::of(-1000i32..1000),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(value, children)| TreeSpec { value, children })
    })
}

/// Strategy for generating the top-level registrations of a join
pub fn forest_strategy() -> impl Strategy<Value = Vec<TreeSpec>> {
    prop::collection::vec(tree_strategy(), 1..5)
}

/// Strategy for generating the order in which pending continuations fire
pub fn completion_order_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(any::<usize>(), 1..64)
}
