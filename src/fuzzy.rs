//! Edit-distance based name suggestions for diagnostics.
//!
//! When an expression uses an unknown function or aggregation name, the
//! nearest known names (by case-insensitive Levenshtein distance over names
//! and keywords) are offered in the error message. Diagnostics only; never
//! used for resolution.

/// Case-insensitive Levenshtein distance between two strings.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().flat_map(|c| c.to_lowercase()).collect();
    let b: Vec<char> = b.chars().flat_map(|c| c.to_lowercase()).collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two-row dynamic programming.
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest canonical names for an invalid one.
///
/// `terms` yields `(searchable term, canonical name)` pairs; a name is
/// typically searchable both under itself and under each of its keywords.
/// Matches are capped at distance `min(4, len(invalid) - 1)` so short typos
/// never match wildly different names; results are ordered best first, ties
/// broken alphabetically.
pub fn closest_matches<'a>(
    invalid: &str,
    terms: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Vec<String> {
    let max_distance = 4.min(invalid.chars().count().saturating_sub(1));

    let mut best: Vec<(usize, String)> = Vec::new();
    for (term, name) in terms {
        let d = edit_distance(invalid, term);
        if d > max_distance {
            continue;
        }
        match best.iter_mut().find(|(_, n)| n == name) {
            Some(entry) => entry.0 = entry.0.min(d),
            None => best.push((d, name.to_string())),
        }
    }

    best.sort_by(|(da, na), (db, nb)| da.cmp(db).then_with(|| na.cmp(nb)));
    best.into_iter().map(|(_, name)| name).collect()
}
