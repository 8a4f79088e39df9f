use std::ops::{Index, Range};

/// Number of leading items `old[old_range]` and `new[new_range]` share.
pub fn common_prefix_len<Old, New>(old: &Old, old_range: Range<usize>, new: &New, new_range: Range<usize>) -> usize
where
    Old: Index<usize> + ?Sized,
    New: Index<usize> + ?Sized,
    New::Output: PartialEq<Old::Output>,
{
    common_len(old, old_range, new, new_range)
}

/// Number of trailing items `old[old_range]` and `new[new_range]` share.
pub fn common_suffix_len<Old, New>(old: &Old, old_range: Range<usize>, new: &New, new_range: Range<usize>) -> usize
where
    Old: Index<usize> + ?Sized,
    New: Index<usize> + ?Sized,
    New::Output: PartialEq<Old::Output>,
{
    common_len(old, old_range.rev(), new, new_range.rev())
}

fn common_len<Old, New>(
    old: &Old,
    old_indices: impl Iterator<Item = usize>,
    new: &New,
    new_indices: impl Iterator<Item = usize>,
) -> usize
where
    Old: Index<usize> + ?Sized,
    New: Index<usize> + ?Sized,
    New::Output: PartialEq<Old::Output>,
{
    new_indices
        .zip(old_indices)
        .take_while(|&(new_index, old_index)| new[new_index] == old[old_index])
        .count()
}
