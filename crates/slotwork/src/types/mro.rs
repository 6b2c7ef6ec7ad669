//! Method resolution order and solid-base selection for new types.

use crate::{
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
};

impl Runtime {
    /// Computes the C3 linearization for a type with the given bases.
    ///
    /// `self_id` is the id the type will receive; nothing is allocated here so
    /// an inconsistent hierarchy leaves no partially built type behind.
    pub(crate) fn compute_c3_mro(&self, self_id: HeapId, bases: &[HeapId]) -> RunResult<Vec<HeapId>> {
        if bases.is_empty() {
            return Ok(vec![self_id, self.core.object]);
        }

        if bases.contains(&self_id) {
            return Err(ExcType::type_error("a class cannot inherit from itself"));
        }

        let max_depth = self.config.max_inheritance_depth;
        let mut linearizations: Vec<Vec<HeapId>> = Vec::with_capacity(bases.len() + 1);
        for &base_id in bases {
            let Some(base) = self.heap.type_obj(base_id) else {
                return Err(ExcType::type_error("bases must be types"));
            };
            // Check inheritance depth, rejecting chains deeper than the configured limit
            if base.mro.len() >= max_depth {
                return Err(ExcType::type_error(format!(
                    "inheritance chain too deep (maximum depth {max_depth})"
                )));
            }
            linearizations.push(base.mro.clone());
        }

        // The list of bases itself is merged last
        linearizations.push(bases.to_vec());

        let max_len = self.config.max_mro_length;
        let mut result = vec![self_id];
        loop {
            linearizations.retain(|l| !l.is_empty());
            if linearizations.is_empty() {
                break;
            }

            // A good head does not appear in the tail of any list
            let found = linearizations
                .iter()
                .map(|lin| lin[0])
                .find(|candidate| !linearizations.iter().any(|other| other[1..].contains(candidate)));

            let Some(next) = found else {
                let base_names: Vec<String> = bases.iter().map(|&id| self.type_name(id).to_string()).collect();
                return Err(ExcType::type_error(format!(
                    "Cannot create a consistent method resolution order (MRO) for bases {}",
                    base_names.join(", ")
                )));
            };
            result.push(next);
            for lin in &mut linearizations {
                if lin.first() == Some(&next) {
                    lin.remove(0);
                }
            }

            if result.len() > max_len {
                return Err(ExcType::type_error("MRO exceeds maximum length"));
            }
        }

        log::trace!("computed MRO of length {} for {} base(s)", result.len(), bases.len());
        Ok(result)
    }

    /// Picks the base whose instance layout every other base's layout is compatible with.
    ///
    /// That base becomes the single parent at the representation level; the
    /// other bases are reached through the MRO only.
    pub(crate) fn best_base(&self, bases: &[HeapId]) -> RunResult<HeapId> {
        let mut winner: Option<HeapId> = None;
        for &candidate in bases {
            let Some(candidate_type) = self.heap.type_obj(candidate) else {
                return Err(ExcType::type_error("bases must be types"));
            };
            let Some(current) = winner else {
                winner = Some(candidate);
                continue;
            };
            let current_layout = self.heap.type_obj(current).map(|t| t.layout);
            let candidate_layout = candidate_type.layout;
            match current_layout {
                Some(layout) if layout.extends(candidate_layout) => {}
                Some(layout) if candidate_layout.extends(layout) => winner = Some(candidate),
                _ => return Err(ExcType::type_error("multiple bases have instance lay-out conflict")),
            }
        }
        winner.ok_or_else(|| ExcType::type_error("bases must not be empty"))
    }

    /// Whether following `base` pointers from a type with this MRO visits
    /// exactly the MRO, which lets attribute lookup walk parents directly.
    pub(crate) fn chain_matches_mro(&self, mro: &[HeapId], base: Option<HeapId>) -> bool {
        let mut expected = mro.iter().skip(1);
        let mut current = base;
        while let Some(id) = current {
            if expected.next() != Some(&id) {
                return false;
            }
            current = self.heap.type_obj(id).and_then(|t| t.base);
        }
        expected.next().is_none()
    }
}
