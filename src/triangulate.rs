// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Fan triangulation (spec §4.3): every polygonal face is decomposed as
//! `(v0, v1, v2), (v0, v2, v3), ..., (v0, v_{k-2}, v_{k-1})`. No attempt is
//! made at robust triangulation of concave polygons — a stated non-goal;
//! such inputs may render with self-intersections.

/// Yields the vertex-index triples of a fan triangulation of `face`
/// (a polygon given as an ordered list of vertex references, of whatever
/// type `T` the caller's per-format vertex key is).
pub fn fan_triangulate<T: Copy>(face: &[T]) -> impl Iterator<Item = [T; 3]> + '_ {
    let v0 = face.first().copied();
    (1..face.len().saturating_sub(1)).filter_map(move |i| {
        v0.map(|v0| [v0, face[i], face[i + 1]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_yields_itself() {
        let face = [0, 1, 2];
        let tris: Vec<_> = fan_triangulate(&face).collect();
        assert_eq!(tris, vec![[0, 1, 2]]);
    }

    #[test]
    fn pentagon_fans_from_first_vertex() {
        let face = [0, 1, 2, 3, 4];
        let tris: Vec<_> = fan_triangulate(&face).collect();
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn degenerate_faces_yield_nothing() {
        let face: [i32; 2] = [0, 1];
        assert_eq!(fan_triangulate(&face).count(), 0);
        let face: [i32; 0] = [];
        assert_eq!(fan_triangulate(&face).count(), 0);
    }
}
