use std::hash::Hash;

use rustc_hash::FxHashSet;

use crate::resolve::Resolve;

/// Orders everything reachable from `roots` so that dependencies come before
/// their dependents.
///
/// Roots are visited in order and each node's dependencies in the order
/// `deps` returns them, so the result is deterministic. Nodes are
/// deduplicated by `key`. A failure of `deps` aborts the traversal. A
/// dependency cycle is returned as `Ok(Err(path))`, where `path` starts and
/// ends with the same node and lists the cycle in traversal order.
pub fn top_closure<T, K, FK, FD>(
    roots: impl IntoIterator<Item = T>,
    key: FK,
    deps: FD,
) -> Resolve<Result<Vec<T>, Vec<T>>>
where
    T: Clone,
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FD: FnMut(&T) -> Resolve<Vec<T>>,
{
    let mut closure = Closure {
        key,
        deps,
        visited: FxHashSet::default(),
        in_progress: FxHashSet::default(),
        path: vec![],
        sorted: vec![],
    };

    for root in roots {
        if let Err(cycle) = closure.visit(root)? {
            return Ok(Err(cycle));
        }
    }

    Ok(Ok(closure.sorted))
}

struct Closure<T, K, FK, FD> {
    key: FK,
    deps: FD,
    visited: FxHashSet<K>,
    in_progress: FxHashSet<K>,
    path: Vec<T>,
    sorted: Vec<T>,
}

impl<T, K, FK, FD> Closure<T, K, FK, FD>
where
    T: Clone,
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FD: FnMut(&T) -> Resolve<Vec<T>>,
{
    fn visit(&mut self, node: T) -> Resolve<Result<(), Vec<T>>> {
        let key = (self.key)(&node);

        if self.in_progress.contains(&key) {
            let start = self
                .path
                .iter()
                .position(|on_path| (self.key)(on_path) == key)
                .unwrap_or(0);
            let mut cycle = self.path[start..].to_vec();
            cycle.push(node);
            return Ok(Err(cycle));
        }
        if !self.visited.insert(key) {
            return Ok(Ok(()));
        }

        self.in_progress.insert((self.key)(&node));
        self.path.push(node.clone());

        for dep in (self.deps)(&node)? {
            if let Err(cycle) = self.visit(dep)? {
                return Ok(Err(cycle));
            }
        }

        self.path.pop();
        self.in_progress.remove(&(self.key)(&node));
        self.sorted.push(node);
        Ok(Ok(()))
    }
}
