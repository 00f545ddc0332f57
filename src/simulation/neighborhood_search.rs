use rstar::{primitives::GeomWithData, RTree};

use crate::{
    concurrency::par_iter_mut1,
    floating_type_mod::FT,
    simulation_parameters::{NeighborhoodSearchAlgorithm, SimulationParams},
    V, V2, V2I,
};

const MAX_NEIGHBOR_COUNT: usize = 2000;

/**
 * Per-particle neighbor lists, rebuilt every step before the density pass.
 * A particle is always contained in its own list since the density sum
 * includes the self-contribution.
 */
pub struct NeighborhoodCache {
    neighs: Vec<Vec<u32>>,
}

impl NeighborhoodCache {
    pub fn new(num_particles: usize) -> Self {
        NeighborhoodCache {
            neighs: (0..num_particles).map(|_| Vec::new()).collect(),
        }
    }

    pub fn iter<'a>(&'a self, i: usize) -> impl Iterator<Item = usize> + 'a {
        self.neighs[i].iter().map(|&x| x as usize)
    }

    pub fn neighbor_count(&self, i: usize) -> usize {
        self.neighs[i].len()
    }

    pub fn len(&self) -> usize {
        self.neighs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighs.is_empty()
    }

    #[inline(always)]
    pub fn build_neighborhood_list_grid(&mut self, positions: &[V2], support_radius: FT) {
        fn particle_to_cell_pos(particle_pos: V2, support_radius: FT) -> V2I {
            (particle_pos / support_radius).map(|x| x.floor() as i32)
        }

        if positions.is_empty() {
            for p_neighs in &mut self.neighs {
                p_neighs.clear();
            }
            return;
        }

        let mut domain_min = positions[0];
        let mut domain_max = positions[0];
        for position in positions {
            for d in 0..2 {
                domain_min[d] = FT::min(domain_min[d], position[d]);
                domain_max[d] = FT::max(domain_max[d], position[d]);
            }
        }

        let cells_min = domain_min.map(|x| (x / support_radius).floor() as i32 - 1);
        let cells_max = domain_max.map(|x| (x / support_radius).floor() as i32 + 2);
        let grid_size: V<usize, 2> = (cells_max - cells_min).map(|x| x as usize);

        let mut grid = CellGrid::new(cells_min, grid_size);
        for (particle_id, position) in positions.iter().enumerate() {
            let cell_pos = particle_to_cell_pos(*position, support_radius);
            grid.get_mut(cell_pos).push(particle_id as u32);
        }

        par_iter_mut1(&mut self.neighs, |particle_id, p_neighs| {
            p_neighs.clear();

            let this_particle_position = positions[particle_id];
            let particle_cell_pos = particle_to_cell_pos(this_particle_position, support_radius);

            for y in -1..=1 {
                for x in -1..=1 {
                    let cell_pos = particle_cell_pos + V2I::from([x, y]);

                    let mut outside = false;
                    for d in 0..2 {
                        if cell_pos[d] < cells_min[d] || cell_pos[d] >= cells_max[d] {
                            outside = true;
                        }
                    }
                    if outside {
                        continue;
                    }

                    for &neigh_particle_id in grid.get(cell_pos) {
                        let neigh_particle_position = positions[neigh_particle_id as usize];
                        if (neigh_particle_position - this_particle_position).norm_squared()
                            >= support_radius * support_radius
                        {
                            continue;
                        }

                        if p_neighs.len() == MAX_NEIGHBOR_COUNT {
                            panic!("exceeded maximum allowed number of {} neighbors", MAX_NEIGHBOR_COUNT);
                        }
                        p_neighs.push(neigh_particle_id);
                    }
                }
            }
        });
    }

    #[inline(always)]
    pub fn build_neighborhood_list_rstar(&mut self, positions: &[V2], support_radius: FT) {
        type RTreeElem = GeomWithData<[FT; 2], usize>;

        let rtree_elems: Vec<RTreeElem> = positions
            .iter()
            .enumerate()
            .map(|(idx, pos)| RTreeElem::new([pos.x, pos.y], idx))
            .collect();
        let rtree = RTree::bulk_load(rtree_elems);

        let max_dist_sq = support_radius * support_radius;

        par_iter_mut1(&mut self.neighs, |particle_id, p_neighs| {
            p_neighs.clear();

            let this_particle_position = positions[particle_id];
            for neigh in
                rtree.locate_within_distance([this_particle_position.x, this_particle_position.y], max_dist_sq)
            {
                if p_neighs.len() == MAX_NEIGHBOR_COUNT {
                    panic!("exceeded maximum allowed number of {} neighbors", MAX_NEIGHBOR_COUNT);
                }
                p_neighs.push(neigh.data as u32);
            }
        });
    }
}

#[inline(always)]
pub fn build_neighborhood_list(
    simulation_params: SimulationParams,
    positions: &[V2],
    support_radius: FT,
    neighs: &mut NeighborhoodCache,
) {
    match simulation_params.neighborhood_search_algorithm {
        NeighborhoodSearchAlgorithm::Grid => neighs.build_neighborhood_list_grid(positions, support_radius),
        NeighborhoodSearchAlgorithm::RStar => neighs.build_neighborhood_list_rstar(positions, support_radius),
    }
}

struct CellGrid {
    grid_min: V2I,
    size: V<usize, 2>,
    cells: Vec<Vec<u32>>,
}

impl CellGrid {
    fn new(grid_min: V2I, grid_size: V<usize, 2>) -> CellGrid {
        let num_elements = grid_size[0] * grid_size[1];
        CellGrid {
            grid_min,
            size: grid_size,
            cells: (0..num_elements).map(|_| Vec::new()).collect(),
        }
    }

    fn pos_to_idx(&self, mut cell_pos: V2I) -> usize {
        cell_pos -= self.grid_min;

        let mut multiplier = 1;
        let mut idx: usize = 0;
        for d in 0..2 {
            assert!(0 <= cell_pos[d]);
            assert!((cell_pos[d] as usize) < self.size[d]);
            idx += multiplier * cell_pos[d] as usize;
            multiplier *= self.size[d];
        }
        idx
    }

    fn get(&self, cell_pos: V2I) -> &Vec<u32> {
        let idx = self.pos_to_idx(cell_pos);
        &self.cells[idx]
    }

    fn get_mut(&mut self, cell_pos: V2I) -> &mut Vec<u32> {
        let idx = self.pos_to_idx(cell_pos);
        &mut self.cells[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec2f;
    use rand::{Rng, SeedableRng};

    fn random_positions(n: usize, extent: FT, seed: u64) -> Vec<V2> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| vec2f(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent)))
            .collect()
    }

    fn brute_force_neighbors(positions: &[V2], support_radius: FT, i: usize) -> Vec<usize> {
        let mut result: Vec<usize> = (0..positions.len())
            .filter(|&j| (positions[i] - positions[j]).norm_squared() < support_radius * support_radius)
            .collect();
        result.sort();
        result
    }

    fn check_against_brute_force(algorithm: NeighborhoodSearchAlgorithm) {
        let support_radius = 25.;
        let positions = random_positions(300, 200., 42);

        let simulation_params = SimulationParams {
            neighborhood_search_algorithm: algorithm,
            ..SimulationParams::default()
        };

        let mut neighs = NeighborhoodCache::new(positions.len());
        build_neighborhood_list(simulation_params, &positions, support_radius, &mut neighs);

        for i in 0..positions.len() {
            let mut found: Vec<usize> = neighs.iter(i).collect();
            found.sort();
            let expected = brute_force_neighbors(&positions, support_radius, i);
            assert_eq!(found, expected, "neighbor mismatch for particle {}", i);
            assert!(found.contains(&i), "particle {} is not neighbor of itself", i);
        }
    }

    #[test]
    fn grid_search_matches_brute_force() {
        check_against_brute_force(NeighborhoodSearchAlgorithm::Grid);
    }

    #[test]
    fn rstar_search_matches_brute_force() {
        check_against_brute_force(NeighborhoodSearchAlgorithm::RStar);
    }

    #[test]
    fn empty_particle_set() {
        let mut neighs = NeighborhoodCache::new(0);
        neighs.build_neighborhood_list_grid(&[], 10.);
        assert_eq!(neighs.len(), 0);
    }
}
