mod build;
mod interaction;
mod view;

pub(super) use interaction::{
    InteractionCommand, InteractionController, InteractionEvent, InteractionState, can_explore,
    hit_test_edge, hit_test_node,
};
