//! Dependency ordering of entity types
//!
//! Entity types form a DAG with edges child → parent, taken from the
//! foreign keys declared in the entity schemas. Export order and restore
//! order are the same topological order: every type comes after all of
//! its parents. Ties are broken by declaration order so the order, and
//! with it archive checksums, never change between runs.
//!
//! The order of the static table is computed once per process. A cycle in
//! that table is a programming error and aborts the process on first use.

use ferry_core::EntityType;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors from building a dependency order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The edges contain a cycle through these types
    #[error("dependency cycle among entity types: {}", format_types(.0))]
    Cycle(Vec<EntityType>),

    /// An edge points at a type that is not a node of the graph
    #[error("{child} depends on {parent}, which is not part of the graph")]
    UnknownParent {
        /// Dependent type
        child: EntityType,
        /// Missing type
        parent: EntityType,
    },
}

fn format_types(types: &[EntityType]) -> String {
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Directed graph over entity types, edges child → parent
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    parents: BTreeMap<EntityType, BTreeSet<EntityType>>,
}

impl DependencyGraph {
    /// Graph from arbitrary nodes and (child, parent) edges
    pub fn new(
        nodes: impl IntoIterator<Item = EntityType>,
        edges: impl IntoIterator<Item = (EntityType, EntityType)>,
    ) -> Self {
        let mut parents: BTreeMap<EntityType, BTreeSet<EntityType>> =
            nodes.into_iter().map(|n| (n, BTreeSet::new())).collect();
        for (child, parent) in edges {
            parents.entry(child).or_default().insert(parent);
        }
        Self { parents }
    }

    /// Graph of every entity type with the edges declared by its foreign keys
    pub fn from_schemas() -> Self {
        let edges = EntityType::ALL
            .iter()
            .flat_map(|&child| child.parents().into_iter().map(move |p| (child, p)));
        Self::new(EntityType::ALL, edges)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// True when the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Direct parents of a type
    pub fn parents_of(&self, child: EntityType) -> impl Iterator<Item = EntityType> + '_ {
        self.parents.get(&child).into_iter().flatten().copied()
    }

    /// Topological order, parents first (Kahn's algorithm)
    ///
    /// Among types whose parents are all placed, the one earliest in
    /// declaration order goes next.
    pub fn build(&self) -> Result<Vec<EntityType>, GraphError> {
        let mut in_degree: BTreeMap<EntityType, usize> = BTreeMap::new();
        let mut children: BTreeMap<EntityType, Vec<EntityType>> = BTreeMap::new();

        for (&child, parents) in &self.parents {
            for &parent in parents {
                if !self.parents.contains_key(&parent) {
                    return Err(GraphError::UnknownParent { child, parent });
                }
                children.entry(parent).or_default().push(child);
            }
            in_degree.insert(child, parents.len());
        }

        // EntityType orders by declaration, so the set pops ties deterministically
        let mut ready: BTreeSet<EntityType> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&t, _)| t)
            .collect();

        let mut order = Vec::with_capacity(self.parents.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &child in children.get(&next).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(&child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        if order.len() != self.parents.len() {
            let stuck = in_degree
                .into_iter()
                .filter(|&(_, degree)| degree > 0)
                .map(|(t, _)| t)
                .collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }

    /// `roots` plus every type they transitively depend on
    pub fn closure(&self, roots: impl IntoIterator<Item = EntityType>) -> BTreeSet<EntityType> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<EntityType> = roots.into_iter().collect();
        while let Some(t) = stack.pop() {
            if seen.insert(t) {
                stack.extend(self.parents_of(t));
            }
        }
        seen
    }
}

static ORDER: Lazy<Vec<EntityType>> = Lazy::new(|| match DependencyGraph::from_schemas().build() {
    Ok(order) => order,
    Err(e) => panic!("entity schema table is not a DAG: {}", e),
});

/// Export and restore order of every entity type
pub fn dependency_order() -> &'static [EntityType] {
    &ORDER
}

/// Position of a type in the dependency order
pub fn rank(entity: EntityType) -> usize {
    ORDER.iter().position(|&t| t == entity).unwrap_or(usize::MAX)
}

/// The given types, sorted into dependency order
pub fn sort_by_dependency(types: &mut [EntityType]) {
    types.sort_by_key(|&t| rank(t));
}

/// `include` plus the mandatory types and all transitive parents, in
/// dependency order
pub fn include_closure(include: &[EntityType]) -> Vec<EntityType> {
    let mandatory = EntityType::ALL
        .into_iter()
        .filter(|t| t.schema().mandatory);
    let closure =
        DependencyGraph::from_schemas().closure(include.iter().copied().chain(mandatory));
    ORDER
        .iter()
        .copied()
        .filter(|t| closure.contains(t))
        .collect()
}
