//! Filter decomposition and fragment matching.
//!
//! A filter is split once, up front, into an ordered list of [`Part`]s:
//! literal byte runs and single-token wildcards. Matching then walks the
//! tree comparing those parts against node prefixes and leaf suffixes
//! (both are just "fragments" here) without ever materializing full
//! subjects.

use crate::{FWC, PWC, TSEP};

/// One element of a decomposed filter.
///
/// Literals keep their trailing token separator (so `foo.*` splits into
/// `Lit("foo.")` + `Pwc`), and the separator that follows a wildcard is
/// folded away rather than emitted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Part<'a> {
    /// A run of literal filter bytes, possibly spanning several tokens.
    Lit(&'a [u8]),
    /// `*`: matches exactly one token.
    Pwc,
    /// `>`: matches one or more trailing tokens; always the last part.
    Fwc,
}

/// Outcome of matching parts against a single fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FragMatch<'a> {
    /// The fragment is inconsistent with the filter.
    Mismatch,
    /// The fragment was consumed; these parts continue at the children.
    /// Never empty.
    Descend(Vec<Part<'a>>),
    /// The filter was consumed exactly at the end of the fragment. A leaf
    /// matches outright; at an internal node only a subject ending here
    /// (the terminal child) can match.
    Matched,
    /// A `>` was reached: every subject at or below here matches.
    MatchedAll,
    /// A trailing `*` ran to the end of the fragment without finding a
    /// token separator. The current token is still open: a leaf matches
    /// outright, while an internal node must keep matching the open token
    /// through its children.
    TrailingWild,
}

/// Split a filter into parts.
///
/// A wildcard byte is only recognized when it occupies a whole token: at
/// the start of the filter or right after a separator, and at the end of
/// the filter or right before one. Anything else stays literal, so a
/// malformed filter still parses (it just will not match stored subjects,
/// which cannot contain wildcard tokens of their own). `>` is recognized
/// only as the final token. A filter with no recognized wildcard yields a
/// single literal part equal to the filter.
pub(crate) fn gen_parts(filter: &[u8]) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    if filter.is_empty() {
        return parts;
    }
    let e = filter.len() - 1;
    let mut start = 0;
    let mut i = 0;
    while i < filter.len() {
        let c = filter[i];
        if c == TSEP {
            // Separator followed by a whole-token `*`.
            if i < e && filter[i + 1] == PWC && ((i + 2 <= e && filter[i + 2] == TSEP) || i + 1 == e)
            {
                if i > start {
                    // The literal keeps its trailing separator.
                    parts.push(Part::Lit(&filter[start..=i]));
                }
                parts.push(Part::Pwc);
                i += 1;
                if i + 2 <= e {
                    // Fold away the separator after the wildcard.
                    i += 1;
                }
                start = i + 1;
            } else if i < e && filter[i + 1] == FWC && i + 1 == e {
                // Separator followed by a terminal `>`.
                if i > start {
                    parts.push(Part::Lit(&filter[start..=i]));
                }
                parts.push(Part::Fwc);
                i += 1;
                start = i + 1;
            }
        } else if c == PWC || c == FWC {
            // A leading wildcard token (or one we reach directly because
            // the preceding separator did not claim it).
            let tok_start = i == 0 || filter[i - 1] == TSEP;
            let tok_end = i + 1 > e || (i + 1 < e && filter[i + 1] == TSEP);
            if tok_start && tok_end {
                parts.push(if c == PWC { Part::Pwc } else { Part::Fwc });
                if i + 1 <= e {
                    i += 1;
                }
                start = i + 1;
            }
        }
        i += 1;
    }
    if start < filter.len() {
        // A separator left over from a folded wildcard is not a part.
        if filter[start] == TSEP {
            start += 1;
        }
        parts.push(Part::Lit(&filter[start..]));
    }
    parts
}

/// Match `parts` against a fragment (a node prefix or a leaf suffix).
///
/// The fragment is consumed left to right. Literal parts larger than the
/// remaining fragment are truncated into the returned remainder so the
/// child level can match the rest; that is the one case that builds a new
/// part list (reslicing the filter, never copying bytes).
pub(crate) fn match_parts<'a>(parts: &[Part<'a>], frag: &[u8]) -> FragMatch<'a> {
    let lf = frag.len();
    if lf == 0 {
        // Vacuously consumed; the caller keeps all parts.
        return if parts.is_empty() {
            FragMatch::Matched
        } else {
            FragMatch::Descend(parts.to_vec())
        };
    }
    if parts.is_empty() {
        return FragMatch::Mismatch;
    }
    let last = parts.len() - 1;
    let mut si = 0;
    for (i, part) in parts.iter().enumerate() {
        if si >= lf {
            return FragMatch::Descend(parts[i..].to_vec());
        }
        match *part {
            Part::Pwc => match frag[si..].iter().position(|&b| b == TSEP) {
                // Token runs past the end of the fragment.
                None if i == last => return FragMatch::TrailingWild,
                None => return FragMatch::Descend(parts[i..].to_vec()),
                Some(k) => si += k + 1,
            },
            Part::Fwc => return FragMatch::MatchedAll,
            Part::Lit(lit) => {
                let end = (si + lit.len()).min(lf);
                let take = end - si;
                if lit[..take] != frag[si..end] {
                    return FragMatch::Mismatch;
                }
                if end < lf {
                    si = end;
                    continue;
                }
                if take < lit.len() {
                    // Fragment ended inside the literal; hand the rest of
                    // it down to the children.
                    let mut rem = parts[i..].to_vec();
                    rem[0] = Part::Lit(&lit[take..]);
                    return FragMatch::Descend(rem);
                }
                if i == last {
                    return FragMatch::Matched;
                }
                si = end;
            }
        }
    }
    // Parts ran out with fragment bytes left over.
    FragMatch::Mismatch
}
