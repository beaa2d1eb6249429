use cellgrid_engine::{
    geometry, AgentId, CellGridError, CellId, Neighborhood, PlacementRule, Residency, World,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const RANDOM: PlacementRule = PlacementRule::RandomOnEmptyCells;

fn grid(xlen: usize, ylen: usize) -> World {
    let mut world = World::new(xlen, ylen).unwrap();
    world.create_default_grid().unwrap();
    world
}

fn coords(world: &World, id: CellId) -> (usize, usize) {
    let cell = world.cell(id).unwrap();
    (cell.x(), cell.y())
}

#[test]
fn von_neumann_neighbors_of_origin_on_torus() {
    let mut world = grid(5, 5);
    world.resolve_neighbor_cells(&Neighborhood::VonNeumann, true).unwrap();
    let origin = world.cell_at(0, 0).unwrap();
    let neighbors: Vec<_> = world
        .cell(origin)
        .unwrap()
        .neighbor_cells()
        .iter()
        .map(|id| coords(&world, id.unwrap()))
        .collect();
    assert_eq!(neighbors, vec![(0, 4), (1, 0), (0, 1), (4, 0)]);

    // A fresh resolution against the matrix gives the same order.
    let again = world.cell(origin).unwrap().find_arounding_cells(
        &"von-neumann".parse().unwrap(),
        5,
        5,
        world.grid_as_matrix(),
        true,
    );
    assert_eq!(again, world.cell(origin).unwrap().neighbor_cells());
}

#[test]
fn geometry_wraps_on_a_ten_cell_axis() {
    assert_eq!(geometry::squared_distance_on_torus(1.0, 9.0, 10.0), 4.0);
    assert_eq!(geometry::squared_distance(1.0, 9.0), 64.0);
    assert_eq!(geometry::direction_to_target(2.0, 2.0, Some(10.0), true), Ok(0));
    assert_eq!(geometry::direction_to_target(0.0, 9.0, Some(10.0), true), Ok(-1));
}

#[test]
fn full_placement_then_overflow() {
    let mut world = grid(5, 4);
    let mut rng = StdRng::seed_from_u64(77);
    world.create_agents("settlers", || (), 20, true).unwrap();
    world.place_agents_on_grid("settlers", RANDOM, &mut rng).unwrap();
    assert!(world.get_empty_cells().is_empty());

    let mut homes: Vec<CellId> = world
        .population("settlers")
        .unwrap()
        .iter()
        .map(|id| world.agent(*id).unwrap().residence().unwrap())
        .collect();
    homes.sort();
    homes.dedup();
    assert_eq!(homes.len(), 20);

    world.create_agents("latecomers", || (), 1, true).unwrap();
    let err = world.place_agents_on_grid("latecomers", RANDOM, &mut rng).unwrap_err();
    assert!(matches!(err, CellGridError::CapacityExceeded { requested: 1, available: 0 }));
    let latecomer = world.population("latecomers").unwrap()[0];
    assert_eq!(world.agent(latecomer).unwrap().residency(), Residency::Unbound);
    world.check_consistency().unwrap();
}

#[test]
fn replacing_an_already_placed_population() {
    let mut world = grid(3, 3);
    let mut rng = StdRng::seed_from_u64(4);
    world.create_agents("walkers", || (), 4, true).unwrap();
    world.place_agents_on_grid("walkers", RANDOM, &mut rng).unwrap();
    // Placed agents hold four cells, so a second pass only sees five empty ones.
    world.place_agents_on_grid("walkers", RANDOM, &mut rng).unwrap();
    assert_eq!(world.get_empty_cells().len(), 5);
    world.check_consistency().unwrap();
}

#[test]
fn retired_agent_is_never_rebound() {
    let mut world = grid(2, 2);
    let ids = world.create_agents("walkers", || (), 2, true).unwrap();
    let cell = world.cell_at(0, 0).unwrap();
    world.move_in(ids[0], cell).unwrap();
    world.move_in(ids[1], cell).unwrap();
    world.die(ids[0]).unwrap();

    // The retiring main resident leaves the slot empty.
    assert_eq!(world.cell(cell).unwrap().main_resident(), None);
    assert_eq!(world.cell(cell).unwrap().residents(), &[ids[1]]);

    assert!(world.move_to_this_cell(ids[0], cell).is_err());
    assert!(matches!(world.die(ids[0]), Err(CellGridError::PreconditionViolation(_))));
    assert_eq!(world.heaven(), &[ids[0]]);
    world.check_consistency().unwrap();
}

#[derive(Debug, Clone)]
enum Op {
    MoveIn(usize, usize),
    MoveOut(usize),
    MoveTo(usize, usize),
    Die(usize),
}

const AGENTS: usize = 6;
const CELLS: usize = 9;

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..AGENTS, 0..CELLS).prop_map(|(a, c)| Op::MoveIn(a, c)),
        2 => (0..AGENTS).prop_map(Op::MoveOut),
        4 => (0..AGENTS, 0..CELLS).prop_map(|(a, c)| Op::MoveTo(a, c)),
        1 => (0..AGENTS).prop_map(Op::Die),
    ]
}

fn apply(world: &mut World, ids: &[AgentId], op: &Op) {
    let result = match *op {
        Op::MoveIn(a, c) => {
            let target = world.grid_as_flat_list()[c];
            world.move_in(ids[a], target)
        }
        Op::MoveOut(a) => world.move_out(ids[a]),
        Op::MoveTo(a, c) => {
            let target = world.grid_as_flat_list()[c];
            world.move_to_this_cell(ids[a], target)
        }
        Op::Die(a) => world.die(ids[a]),
    };
    // Rejected operations are fine; they must simply leave the world consistent.
    if let Err(err) = result {
        assert!(matches!(err, CellGridError::PreconditionViolation(_)), "unexpected error {err:?}");
    }
}

proptest! {
    #[test]
    fn residency_invariants_hold_for_any_move_sequence(
        ops in proptest::collection::vec(op(), 1..60)
    ) {
        let mut world = grid(3, 3);
        let ids = world.create_agents("walkers", || (), AGENTS, true).unwrap();

        for op in &ops {
            apply(&mut world, &ids, op);
            prop_assert!(world.check_consistency().is_ok(), "inconsistent after {:?}", op);

            for cell in world.cells() {
                if let Some(main) = cell.main_resident() {
                    prop_assert!(cell.has_resident(main));
                }
            }
            for id in &ids {
                let agent = world.agent(*id).unwrap();
                if let Some(home) = agent.residence() {
                    let cell = world.cell(home).unwrap();
                    prop_assert!(cell.has_resident(*id));
                    prop_assert_eq!(agent.position(), Some((cell.x(), cell.y())));
                }
            }
        }

        let retired = ids.iter().filter(|id| world.agent(**id).unwrap().is_retired()).count();
        prop_assert_eq!(world.heaven().len(), retired);
        prop_assert_eq!(world.population("walkers").unwrap().len(), AGENTS - retired);
    }

    #[test]
    fn torus_distance_never_exceeds_direct(a in 0u32..50, b in 0u32..50, len in 50u32..80) {
        let (a, b, len) = (a as f64, b as f64, len as f64);
        let wrapped = geometry::squared_distance_on_torus(a, b, len);
        prop_assert!(wrapped <= geometry::squared_distance(a, b));
        prop_assert!(wrapped.sqrt() <= len / 2.0);
    }
}
