//! Role table: an arena of nodes with precomputed permission closures

use std::collections::{BTreeSet, HashMap};

use super::config::RoleDefinition;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Grey,
    Black,
}

#[derive(Debug)]
struct RoleNode {
    definition: RoleDefinition,
    parents: Vec<usize>,
    closure: BTreeSet<String>,
}

/// Immutable once built. Replaced wholesale on every mutation.
#[derive(Debug, Default)]
pub(crate) struct RoleTable {
    nodes: Vec<RoleNode>,
    index: HashMap<String, usize>,
}

impl RoleTable {
    /// Validate the inheritance graph and compute every closure
    pub(crate) fn build(definitions: Vec<RoleDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if index.insert(def.name.clone(), i).is_some() {
                return Err(Error::Config(format!("Duplicate role: {}", def.name)));
            }
        }

        let mut nodes = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let parents = definition
                .inherits
                .iter()
                .map(|parent| {
                    index.get(parent).copied().ok_or_else(|| Error::UndefinedRole {
                        role: parent.clone(),
                        referenced_by: definition.name.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            nodes.push(RoleNode {
                definition,
                parents,
                closure: BTreeSet::new(),
            });
        }

        let order = topological_order(&nodes)?;
        for i in order {
            let mut closure: BTreeSet<String> =
                nodes[i].definition.permissions.iter().cloned().collect();
            for &parent in &nodes[i].parents {
                closure.extend(nodes[parent].closure.iter().cloned());
            }
            nodes[i].closure = closure;
        }

        Ok(Self { nodes, index })
    }

    pub(crate) fn closure(&self, role: &str) -> Option<&BTreeSet<String>> {
        self.index.get(role).map(|&i| &self.nodes[i].closure)
    }

    pub(crate) fn get(&self, role: &str) -> Option<&RoleDefinition> {
        self.index.get(role).map(|&i| &self.nodes[i].definition)
    }

    pub(crate) fn contains(&self, role: &str) -> bool {
        self.index.contains_key(role)
    }

    pub(crate) fn definitions(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.nodes.iter().map(|n| &n.definition)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Roles that directly inherit from `role`
    pub(crate) fn dependents(&self, role: &str) -> Vec<&str> {
        self.definitions()
            .filter(|def| def.inherits.iter().any(|p| p == role))
            .map(|def| def.name.as_str())
            .collect()
    }
}

/// Parents-first ordering via iterative DFS; a grey hit is a cycle
fn topological_order(nodes: &[RoleNode]) -> Result<Vec<usize>> {
    let mut marks = vec![Mark::White; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());

    for start in 0..nodes.len() {
        if marks[start] != Mark::White {
            continue;
        }

        marks[start] = Mark::Grey;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(&(node, next)) = stack.last() {
            let Some(&parent) = nodes[node].parents.get(next) else {
                marks[node] = Mark::Black;
                order.push(node);
                stack.pop();
                continue;
            };

            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            match marks[parent] {
                Mark::White => {
                    marks[parent] = Mark::Grey;
                    stack.push((parent, 0));
                }
                Mark::Grey => {
                    let from = stack.iter().position(|&(n, _)| n == parent).unwrap_or(0);
                    let mut path: Vec<String> = stack[from..]
                        .iter()
                        .map(|&(n, _)| nodes[n].definition.name.clone())
                        .collect();
                    path.push(nodes[parent].definition.name.clone());
                    return Err(Error::InheritanceCycle {
                        role: nodes[parent].definition.name.clone(),
                        path,
                    });
                }
                Mark::Black => {}
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str, perms: &[&str], inherits: &[&str]) -> RoleDefinition {
        RoleDefinition::new(name)
            .with_permissions(perms.iter().copied())
            .inherits(inherits.iter().copied())
    }

    #[test]
    fn test_closure_includes_ancestors() {
        let table = RoleTable::build(vec![
            role("admin", &["delete:articles"], &["editor"]),
            role("editor", &["write:articles"], &["viewer"]),
            role("viewer", &["read:articles"], &[]),
        ])
        .unwrap();

        let admin = table.closure("admin").unwrap();
        assert!(admin.contains("delete:articles"));
        assert!(admin.contains("write:articles"));
        assert!(admin.contains("read:articles"));
        assert_eq!(table.closure("viewer").unwrap().len(), 1);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_diamond_inheritance() {
        let table = RoleTable::build(vec![
            role("base", &["read:a"], &[]),
            role("left", &["write:a"], &["base"]),
            role("right", &["write:b"], &["base"]),
            role("top", &[], &["left", "right"]),
        ])
        .unwrap();
        let top = table.closure("top").unwrap();
        assert_eq!(top.len(), 3);
    }

    #[test]
    fn test_cycle_detected() {
        let err = RoleTable::build(vec![
            role("a", &[], &["b"]),
            role("b", &[], &["c"]),
            role("c", &[], &["a"]),
        ])
        .unwrap_err();

        match err {
            Error::InheritanceCycle { path, .. } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_inheritance_is_a_cycle() {
        let err = RoleTable::build(vec![role("a", &[], &["a"])]).unwrap_err();
        assert!(matches!(
            err,
            Error::InheritanceCycle { ref path, .. } if path == &["a", "a"]
        ));
    }

    #[test]
    fn test_undefined_parent() {
        let err = RoleTable::build(vec![role("editor", &[], &["ghost"])]).unwrap_err();
        assert!(matches!(
            err,
            Error::UndefinedRole { ref role, ref referenced_by } if role == "ghost" && referenced_by == "editor"
        ));
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let err = RoleTable::build(vec![role("a", &[], &[]), role("a", &[], &[])]).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut defs = vec![role("r0", &["read:0"], &[])];
        for i in 1..5_000 {
            let parent = format!("r{}", i - 1);
            defs.push(role(&format!("r{i}"), &[], &[parent.as_str()]));
        }
        let table = RoleTable::build(defs).unwrap();
        assert!(table.closure("r4999").unwrap().contains("read:0"));
    }

    #[test]
    fn test_dependents() {
        let table = RoleTable::build(vec![
            role("viewer", &[], &[]),
            role("editor", &[], &["viewer"]),
        ])
        .unwrap();
        assert_eq!(table.dependents("viewer"), vec!["editor"]);
        assert!(table.dependents("editor").is_empty());
    }
}
