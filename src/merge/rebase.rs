use crate::transform::{Mapping, Transform};

/// Replays the steps of `source` on top of `target` and returns the indices
/// of the steps that still applied.
///
/// `to_target` leads from the first document of `source` to the current
/// document of `target`. Every step is mapped back over the source steps
/// before it, through `to_target`, and forward over the steps replayed so
/// far. Each replayed map mirrors the inverse of its source step, so
/// positions inside content inserted by an earlier replayed step are
/// recovered instead of collapsing. Steps selected by `skip` are dropped
/// along with the content they produced.
pub(crate) fn rebase_steps<F>(
    source: &Transform,
    to_target: &Mapping,
    target: &mut Transform,
    skip: F,
) -> Vec<usize>
where
    F: Fn(usize) -> bool,
{
    let count = source.steps().len();
    let mut mapping = Mapping::new();
    for map in source.mapping().maps().iter().rev() {
        mapping.append_map(map.invert(), None);
    }
    mapping.append_mapping(to_target);

    let mut replayed = Vec::new();
    for (index, step) in source.steps().iter().enumerate() {
        let map_from = count - index;
        if skip(index) {
            continue;
        }
        let Some(mapped) = step.map(&mapping.slice(map_from, mapping.len())) else {
            continue;
        };

        if target.maybe_step(mapped)
            && let Some(map) = target.mapping().maps().last()
        {
            mapping.append_map(map.clone(), Some(map_from - 1));
            replayed.push(index);
        }
    }
    replayed
}
