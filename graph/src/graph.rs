//! DAG storage and traversal.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use weave_types::{Symbol, Transaction};

use crate::GraphError;

/// Callback fired for every incoming transaction before it is committed.
/// Returning an error aborts the ingress.
pub type ReceiveHandler = Box<dyn Fn(u64, &Transaction) -> Result<(), GraphError> + Send + Sync>;

#[derive(Default)]
struct Inner {
    by_symbol: HashMap<Symbol, Transaction>,
    /// Arrival order; position is the transaction's index.
    order: Vec<Symbol>,
    /// Inverse parent adjacency: symbol → symbols that name it as a parent.
    children: HashMap<Symbol, Vec<Symbol>>,
}

impl Inner {
    fn validate(&self, tx: &Transaction) -> Result<(), GraphError> {
        if self.by_symbol.contains_key(&tx.symbol) {
            return Err(GraphError::Duplicate(tx.symbol.clone()));
        }
        if tx.parents.is_empty() {
            // Only the very first transaction may omit parents.
            if !self.order.is_empty() {
                return Err(GraphError::MissingParents(tx.symbol.clone()));
            }
            return Ok(());
        }
        for parent in &tx.parents {
            if !self.by_symbol.contains_key(parent) {
                return Err(GraphError::ParentNotFound {
                    child: tx.symbol.clone(),
                    parent: parent.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The transaction DAG: symbol lookup, arrival index, child adjacency and
/// capped descendant counting.
#[derive(Default)]
pub struct Graph {
    inner: RwLock<Inner>,
    handlers: RwLock<Vec<ReceiveHandler>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, GraphError> {
        self.inner.read().map_err(|_| GraphError::Poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, GraphError> {
        self.inner.write().map_err(|_| GraphError::Poisoned)
    }

    /// Register a receive hook. Hooks run in registration order inside
    /// [`Graph::insert`], before the transaction is committed.
    pub fn add_on_receive_handler(&self, handler: ReceiveHandler) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.push(handler);
        }
    }

    /// Insert a transaction, firing the receive hooks first.
    ///
    /// Hooks observe the transaction before it lands in the graph, so a
    /// rejection leaves nothing to roll back. The index passed to hooks is
    /// re-checked at commit; the graph admits at most one tick of lag for
    /// concurrent inserts, so the engine never depends on it being final.
    pub fn insert(&self, tx: Transaction) -> Result<u64, GraphError> {
        let prospective = {
            let inner = self.read()?;
            inner.validate(&tx)?;
            inner.order.len() as u64
        };

        {
            let handlers = self.handlers.read().map_err(|_| GraphError::Poisoned)?;
            for handler in handlers.iter() {
                handler(prospective, &tx)?;
            }
        }

        let mut inner = self.write()?;
        inner.validate(&tx)?;
        let index = inner.order.len() as u64;
        for parent in &tx.parents {
            inner
                .children
                .entry(parent.clone())
                .or_default()
                .push(tx.symbol.clone());
        }
        inner.order.push(tx.symbol.clone());
        inner.by_symbol.insert(tx.symbol.clone(), tx);
        Ok(index)
    }

    /// Transaction at arrival index `index`.
    pub fn get_by_index(&self, index: u64) -> Result<Transaction, GraphError> {
        let inner = self.read()?;
        let symbol = inner
            .order
            .get(index as usize)
            .ok_or(GraphError::IndexOutOfRange(index))?;
        Ok(inner.by_symbol[symbol].clone())
    }

    /// Transaction identified by `symbol`.
    pub fn get_by_symbol(&self, symbol: &Symbol) -> Result<Transaction, GraphError> {
        let inner = self.read()?;
        inner
            .by_symbol
            .get(symbol)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(symbol.clone()))
    }

    /// Symbols whose parent list names `symbol`.
    pub fn get_children_by_symbol(&self, symbol: &Symbol) -> Result<Vec<Symbol>, GraphError> {
        let inner = self.read()?;
        if !inner.by_symbol.contains_key(symbol) {
            return Err(GraphError::NotFound(symbol.clone()));
        }
        Ok(inner.children.get(symbol).cloned().unwrap_or_default())
    }

    /// Count distinct transactions reachable from `symbol` through child
    /// edges, capped at `limit`. The cap bounds the traversal, so callers
    /// can probe "more than N descendants?" without walking the whole DAG.
    pub fn count_ascendants(&self, symbol: &Symbol, limit: u64) -> Result<u64, GraphError> {
        let inner = self.read()?;
        if !inner.by_symbol.contains_key(symbol) {
            return Err(GraphError::NotFound(symbol.clone()));
        }
        if limit == 0 {
            return Ok(0);
        }

        let mut visited: HashSet<Symbol> = HashSet::new();
        let mut queue: VecDeque<Symbol> = VecDeque::new();
        queue.push_back(symbol.clone());

        let mut count = 0u64;
        while let Some(popped) = queue.pop_front() {
            let Some(children) = inner.children.get(&popped) else {
                continue;
            };
            for child in children {
                if visited.insert(child.clone()) {
                    count += 1;
                    if count >= limit {
                        return Ok(count);
                    }
                    queue.push_back(child.clone());
                }
            }
        }
        Ok(count)
    }

    /// Number of transactions in the graph.
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use weave_types::{AccountId, Signature, Tag};

    fn tx(symbol: &str, parents: &[&str]) -> Transaction {
        Transaction {
            symbol: Symbol::new(symbol),
            sender: AccountId::new([1u8; 32]),
            nonce: 0,
            parents: parents.iter().map(|p| Symbol::new(*p)).collect(),
            tag: Tag::Nop,
            payload: Vec::new(),
            signature: Signature::ZERO,
        }
    }

    #[test]
    fn insert_assigns_sequential_indices() {
        let graph = Graph::new();
        assert_eq!(graph.insert(tx("g", &[])).unwrap(), 0);
        assert_eq!(graph.insert(tx("a", &["g"])).unwrap(), 1);
        assert_eq!(graph.insert(tx("b", &["a"])).unwrap(), 2);

        assert_eq!(graph.get_by_index(0).unwrap().symbol, Symbol::new("g"));
        assert_eq!(graph.get_by_index(2).unwrap().symbol, Symbol::new("b"));
        assert!(matches!(
            graph.get_by_index(3),
            Err(GraphError::IndexOutOfRange(3))
        ));
    }

    #[test]
    fn duplicate_symbol_rejected() {
        let graph = Graph::new();
        graph.insert(tx("g", &[])).unwrap();
        assert!(matches!(
            graph.insert(tx("g", &[])),
            Err(GraphError::Duplicate(_))
        ));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn only_genesis_may_omit_parents() {
        let graph = Graph::new();
        graph.insert(tx("g", &[])).unwrap();
        assert!(matches!(
            graph.insert(tx("orphan", &[])),
            Err(GraphError::MissingParents(_))
        ));
    }

    #[test]
    fn unknown_parent_rejected() {
        let graph = Graph::new();
        graph.insert(tx("g", &[])).unwrap();
        assert!(matches!(
            graph.insert(tx("a", &["missing"])),
            Err(GraphError::ParentNotFound { .. })
        ));
    }

    #[test]
    fn children_track_inverse_adjacency() {
        let graph = Graph::new();
        graph.insert(tx("g", &[])).unwrap();
        graph.insert(tx("a", &["g"])).unwrap();
        graph.insert(tx("b", &["g", "a"])).unwrap();

        let mut children = graph.get_children_by_symbol(&Symbol::new("g")).unwrap();
        children.sort();
        assert_eq!(children, vec![Symbol::new("a"), Symbol::new("b")]);

        assert!(graph
            .get_children_by_symbol(&Symbol::new("b"))
            .unwrap()
            .is_empty());
        assert!(graph.get_children_by_symbol(&Symbol::new("zz")).is_err());
    }

    #[test]
    fn count_ascendants_dedupes_diamonds() {
        // g → a, g → b, a → c, b → c: c reachable twice, counted once.
        let graph = Graph::new();
        graph.insert(tx("g", &[])).unwrap();
        graph.insert(tx("a", &["g"])).unwrap();
        graph.insert(tx("b", &["g"])).unwrap();
        graph.insert(tx("c", &["a", "b"])).unwrap();

        assert_eq!(graph.count_ascendants(&Symbol::new("g"), 10).unwrap(), 3);
        assert_eq!(graph.count_ascendants(&Symbol::new("a"), 10).unwrap(), 1);
        assert_eq!(graph.count_ascendants(&Symbol::new("c"), 10).unwrap(), 0);
    }

    #[test]
    fn count_ascendants_respects_cap() {
        let graph = Graph::new();
        graph.insert(tx("g", &[])).unwrap();
        for i in 0..20 {
            graph.insert(tx(&format!("t{i}"), &["g"])).unwrap();
        }
        assert_eq!(graph.count_ascendants(&Symbol::new("g"), 5).unwrap(), 5);
    }

    #[test]
    fn hook_error_aborts_ingress() {
        let graph = Graph::new();
        graph.insert(tx("g", &[])).unwrap();
        graph.add_on_receive_handler(Box::new(|_, tx| {
            if tx.symbol.as_str() == "bad" {
                Err(GraphError::HookRejected("rejected by test".to_string()))
            } else {
                Ok(())
            }
        }));

        assert!(matches!(
            graph.insert(tx("bad", &["g"])),
            Err(GraphError::HookRejected(_))
        ));
        assert!(graph.get_by_symbol(&Symbol::new("bad")).is_err());

        graph.insert(tx("good", &["g"])).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn hooks_run_for_every_insert() {
        let graph = Graph::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        graph.add_on_receive_handler(Box::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        graph.insert(tx("g", &[])).unwrap();
        graph.insert(tx("a", &["g"])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
