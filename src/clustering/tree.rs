use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};

use super::kmeans::{ModelParams, SparseKMeansModel};
use super::{TreeError, TreeResult};
use crate::core::float::SprFloat;
use crate::store::payload::LeafPayload;
use crate::vector::sparse::SparseVector;

/// Tree-level configuration: the root model configuration that every internal
/// node clones, plus the leaf-size threshold.
pub struct TreeParams<F: SprFloat> {
    pub max_node_size: usize,
    pub model: ModelParams<F>,
}

impl<F: SprFloat> TreeParams<F> {
    pub fn new(model: ModelParams<F>, max_node_size: usize) -> Self {
        Self {
            max_node_size,
            model,
        }
    }
}

/// One node of the partition tree. Internal nodes own a fitted model and
/// exactly `k` children; leaves own an opaque payload handle instead.
/// Ownership is strictly parent-to-child.
pub struct KMeansNode<F: SprFloat> {
    model: Option<SparseKMeansModel<F>>,
    children: Vec<KMeansNode<F>>,
    payload: Option<Box<dyn LeafPayload<F>>>,
    built_size: usize,
    count: AtomicU64,
}

impl<F: SprFloat> KMeansNode<F> {
    fn empty() -> Self {
        Self {
            model: None,
            children: Vec::new(),
            payload: None,
            built_size: 0,
            count: AtomicU64::new(0),
        }
    }

    /// Leaf status is decided at build time and fixed forever after.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[KMeansNode<F>] {
        &self.children
    }

    pub fn model(&self) -> Option<&SparseKMeansModel<F>> {
        self.model.as_ref()
    }

    pub fn payload(&self) -> Option<&dyn LeafPayload<F>> {
        self.payload.as_deref()
    }

    /// Number of samples this node was built from.
    pub fn built_size(&self) -> usize {
        self.built_size
    }

    /// Traversal counter, bumped by [`SparseKMeansTree::insert`].
    pub fn visits(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn summary(&self) -> String {
        if self.is_leaf() {
            let stored = self.payload.as_ref().map(|p| p.size()).unwrap_or(0);
            format!(
                "leaf built={} stored={} visits={}",
                self.built_size,
                stored,
                self.visits()
            )
        } else {
            match &self.model {
                Some(model) => {
                    format!("{} built={} visits={}", model, self.built_size, self.visits())
                }
                None => format!("branch built={} visits={}", self.built_size, self.visits()),
            }
        }
    }
}

impl<F: SprFloat> Drop for KMeansNode<F> {
    // safety net for partially built trees: the payload dispose hook still
    // runs exactly once even when a build aborts mid-recursion
    fn drop(&mut self) {
        if let Some(mut payload) = self.payload.take() {
            payload.dispose();
        }
    }
}

/// Recursive k-means partition tree: samples flow top-down at build time and
/// are re-clustered until groups shrink below the leaf threshold; queries
/// flow top-down through each node's fitted centers until they hit a leaf.
pub struct SparseKMeansTree<F: SprFloat> {
    root: KMeansNode<F>,
    max_node_size: usize,
}

impl<F: SprFloat> std::fmt::Debug for SparseKMeansTree<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseKMeansTree")
            .field("max_node_size", &self.max_node_size)
            .finish_non_exhaustive()
    }
}

impl<F: SprFloat> SparseKMeansTree<F> {
    /// Builds the whole tree eagerly. `sample_payload` acts as the factory
    /// for leaf storage. A fit failure at any node aborts the build; already
    /// attached payloads are disposed on the way out.
    pub fn new(
        sample_payload: &dyn LeafPayload<F>,
        samples: &[SparseVector<F>],
        params: TreeParams<F>,
    ) -> TreeResult<Self> {
        info!(
            "building kmeans tree over {} samples (max node size {})",
            samples.len(),
            params.max_node_size
        );

        let mut root = KMeansNode::empty();
        root.model = Some(SparseKMeansModel::new(params.model.clone()));

        let borrowed: Vec<&SparseVector<F>> = samples.iter().collect();
        Self::fit_node(
            &mut root,
            &borrowed,
            params.max_node_size,
            &params.model,
            sample_payload,
        )?;

        Ok(Self {
            root,
            max_node_size: params.max_node_size,
        })
    }

    pub fn max_node_size(&self) -> usize {
        self.max_node_size
    }

    pub fn root(&self) -> &KMeansNode<F> {
        &self.root
    }

    fn fit_node(
        node: &mut KMeansNode<F>,
        samples: &[&SparseVector<F>],
        max_node_size: usize,
        root_params: &ModelParams<F>,
        sample_payload: &dyn LeafPayload<F>,
    ) -> TreeResult<()> {
        node.built_size = samples.len();

        if samples.len() <= max_node_size {
            node.model = None;
            node.payload = Some(sample_payload.new_payload());
            debug!("leaf with {} samples", samples.len());
            return Ok(());
        }

        let model = node
            .model
            .get_or_insert_with(|| SparseKMeansModel::new(root_params.clone()));
        if !model.is_exclusive() {
            return Err(TreeError::SoftPartitionUnsupported);
        }
        model.fit(samples)?;

        let k = model.k();
        let assignment = model.assignment().to_vec();

        // a group left empty by the fit still yields a (trivial) leaf child,
        // keeping the child list aligned with the cluster ids
        let mut groups: Vec<Vec<&SparseVector<F>>> = vec![Vec::new(); k];
        for (i, &cid) in assignment.iter().enumerate() {
            groups[cid].push(samples[i]);
        }

        for group in &groups {
            let mut child = KMeansNode::empty();
            Self::fit_node(&mut child, group, max_node_size, root_params, sample_payload)?;
            node.children.push(child);
        }

        if let Some(model) = node.model.as_mut() {
            model.clear_training_outcome();
        }
        Ok(())
    }

    /// Routes `v` from the root to a leaf and returns the full node path, a
    /// read-only view for callers needing per-level statistics.
    pub fn search_for_path(&self, v: &SparseVector<F>) -> TreeResult<Vec<&KMeansNode<F>>> {
        let mut path = Vec::new();
        Self::walk(&self.root, v, &mut path)?;
        Ok(path)
    }

    fn walk<'a>(
        node: &'a KMeansNode<F>,
        v: &SparseVector<F>,
        path: &mut Vec<&'a KMeansNode<F>>,
    ) -> TreeResult<()> {
        path.push(node);
        if node.is_leaf() {
            return Ok(());
        }

        let model = node.model.as_ref().ok_or(TreeError::MissingModel)?;
        let (cid, _) = model.predict_best(v);
        if cid >= node.children.len() {
            return Err(TreeError::ClusterIdOutOfRange {
                cid,
                len: node.children.len(),
            });
        }
        Self::walk(&node.children[cid], v, path)
    }

    /// Routes `v` to a leaf and returns only the terminal payload handle.
    pub fn search_for_leaf(&self, v: &SparseVector<F>) -> TreeResult<&dyn LeafPayload<F>> {
        let path = self.search_for_path(v)?;
        match path.last().and_then(|node| node.payload()) {
            Some(payload) => Ok(payload),
            None => Err(TreeError::MissingPayload),
        }
    }

    /// Mutable variant of [`search_for_leaf`](Self::search_for_leaf), for
    /// callers inserting into the leaf's own storage.
    pub fn search_for_leaf_mut(
        &mut self,
        v: &SparseVector<F>,
    ) -> TreeResult<&mut (dyn LeafPayload<F> + 'static)> {
        Self::leaf_mut(&mut self.root, v)
    }

    fn leaf_mut<'a>(
        node: &'a mut KMeansNode<F>,
        v: &SparseVector<F>,
    ) -> TreeResult<&'a mut (dyn LeafPayload<F> + 'static)> {
        if node.is_leaf() {
            return node
                .payload
                .as_deref_mut()
                .ok_or(TreeError::MissingPayload);
        }

        let cid = {
            let model = node.model.as_ref().ok_or(TreeError::MissingModel)?;
            model.predict_best(v).0
        };
        if cid >= node.children.len() {
            return Err(TreeError::ClusterIdOutOfRange {
                cid,
                len: node.children.len(),
            });
        }
        Self::leaf_mut(&mut node.children[cid], v)
    }

    /// Telemetry only: bumps the traversal counter of every node along the
    /// routing path. Leaf payload contents are the caller's integration
    /// point, via [`search_for_leaf_mut`](Self::search_for_leaf_mut).
    pub fn insert(&self, id: u64, v: &SparseVector<F>) -> TreeResult<()> {
        let path = self.search_for_path(v)?;
        for node in &path {
            node.count.fetch_add(1, Ordering::Relaxed);
        }
        debug!("recorded traversal of sample {} across {} nodes", id, path.len());
        Ok(())
    }

    /// Depth-first teardown: children first, then the node's model, then the
    /// leaf payload's dispose hook. Idempotent; also invoked on drop.
    pub fn dispose(&mut self) {
        Self::dispose_node(&mut self.root);
    }

    fn dispose_node(node: &mut KMeansNode<F>) {
        for child in &mut node.children {
            Self::dispose_node(child);
        }
        node.children.clear();
        node.model = None;
        if let Some(mut payload) = node.payload.take() {
            payload.dispose();
        }
    }

    fn render(node: &KMeansNode<F>, f: &mut fmt::Formatter<'_>, prefix: &str) -> fmt::Result {
        let count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            let last = i + 1 == count;
            writeln!(
                f,
                "{}{}{}",
                prefix,
                if last { "└── " } else { "├── " },
                child.summary()
            )?;
            let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
            Self::render(child, f, &next)?;
        }
        Ok(())
    }
}

impl<F: SprFloat> fmt::Display for SparseKMeansTree<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.root.summary())?;
        Self::render(&self.root, f, "")
    }
}

impl<F: SprFloat> Drop for SparseKMeansTree<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}
