use std::sync::Arc;

use emberfall_gameframework::{
    AbilityClass, AbilityGrantState, AbilitySystemComponent, ActorClassName, ActorId,
    FrameworkComponent, GameEngine, GameInstance, WorldKind,
};
use emberfall_gamefeatures::{
    AbilitiesEntry, AbilityMapping, AddAbilitiesAction, GameFeature, GameFeatureAction,
    GameFeatureDefinition, GameFeatureState,
};

const GA_JUMP: &str = "/Game/Abilities/GA_Jump";

fn register_assets(instance: &Arc<GameInstance>) {
    instance
        .assets()
        .register_ability_class(GA_JUMP, AbilityClass::new("GA_Jump"));
}

fn game_setup() -> (GameEngine, Arc<GameInstance>) {
    let engine = GameEngine::new();
    let instance = engine.create_instance(WorldKind::Game);
    register_assets(&instance);
    (engine, instance)
}

fn jump_entry() -> AbilitiesEntry {
    AbilitiesEntry::for_actor_class("Pawn").with_ability(AbilityMapping::new(GA_JUMP))
}

fn ready_pawn(instance: &Arc<GameInstance>) -> ActorId {
    let manager = instance.component_manager();
    let actor = manager.spawn_actor(ActorClassName::from("Pawn"));
    manager.add_receiver(actor).expect("receiver");
    manager.notify_actor_ready(actor).expect("ready");
    actor
}

#[test]
fn deactivation_drains_every_actor_and_request() {
    let (engine, instance) = game_setup();
    let action = AddAbilitiesAction::new(vec![jump_entry()]);
    action.on_activating(&engine);

    let actors: Vec<ActorId> = (0..3).map(|_| ready_pawn(&instance)).collect();
    assert_eq!(action.active_actor_count(), 3);
    assert!(action.outstanding_request_count() > 0);

    let manager = instance.component_manager();
    let handles: Vec<_> = actors
        .iter()
        .map(|actor| {
            (
                *actor,
                action
                    .active_extensions(*actor)
                    .expect("record")
                    .ability_handles[0],
            )
        })
        .collect();

    // Revocation must see the hosts, so look at grant state through a host
    // reference taken before the last request releases the components.
    let hosts: Vec<_> = actors
        .iter()
        .map(|actor| {
            manager
                .find_component::<AbilitySystemComponent>(*actor)
                .expect("host")
        })
        .collect();

    action.on_deactivating(&engine);

    assert_eq!(action.active_actor_count(), 0);
    assert_eq!(action.outstanding_request_count(), 0);
    assert_eq!(
        manager.request_refcount(&ActorClassName::from("Pawn"), AbilitySystemComponent::TYPE_ID),
        0
    );
    for ((_, handle), host) in handles.iter().zip(&hosts) {
        let host = host.lock().expect("host lock");
        assert_eq!(
            host.grant(*handle).map(|grant| grant.state),
            Some(AbilityGrantState::PendingRemoval),
            "every grant was submitted for removal"
        );
    }
}

#[test]
fn deactivating_with_nothing_active_is_a_no_op() {
    let (engine, _instance) = game_setup();
    let action = AddAbilitiesAction::new(vec![jump_entry()]);
    action.on_activating(&engine);
    action.on_deactivating(&engine);
    action.on_deactivating(&engine);
    assert_eq!(action.active_actor_count(), 0);
    assert_eq!(action.outstanding_request_count(), 0);
}

#[test]
fn activation_with_residual_state_forces_a_reset() {
    let (engine, instance) = game_setup();
    let action = AddAbilitiesAction::new(vec![jump_entry()]);
    action.on_activating(&engine);

    let first = ready_pawn(&instance);
    let old_handle = action
        .active_extensions(first)
        .expect("record")
        .ability_handles[0];
    let old_host = instance
        .component_manager()
        .find_component::<AbilitySystemComponent>(first)
        .expect("host");

    // Activate again without deactivating: residual state is revoked
    // before re-subscribing, listeners are not doubled, and the handler
    // replay then re-grants the pawn that is still in scope.
    action.on_activating(&engine);
    assert_eq!(instance.component_manager().extension_handler_count(), 1);
    assert_eq!(action.active_actor_count(), 1);

    let old_host = old_host.lock().expect("host lock");
    assert_eq!(
        old_host.grant(old_handle).map(|grant| grant.state),
        Some(AbilityGrantState::PendingRemoval),
        "the stale grant was submitted for removal"
    );
    drop(old_host);
    assert_eq!(
        action
            .active_extensions(first)
            .expect("fresh record")
            .ability_handles
            .len(),
        1
    );
    let second = ready_pawn(&instance);
    assert_eq!(action.active_actor_count(), 2);
    assert!(action.active_extensions(second).is_some());
}

#[test]
fn reactivation_after_deactivation_grants_again() {
    let (engine, instance) = game_setup();
    let action = AddAbilitiesAction::new(vec![jump_entry()]);
    action.on_activating(&engine);
    let first = ready_pawn(&instance);
    action.on_deactivating(&engine);
    instance
        .component_manager()
        .despawn_actor(first)
        .expect("despawn");

    action.on_activating(&engine);
    let actor = ready_pawn(&instance);
    assert_eq!(action.active_actor_count(), 1);
    assert_eq!(
        action
            .active_extensions(actor)
            .expect("record")
            .ability_handles
            .len(),
        1
    );
}

#[test]
fn actors_ready_after_deactivation_get_nothing() {
    let (engine, instance) = game_setup();
    let action = AddAbilitiesAction::new(vec![jump_entry()]);
    action.on_activating(&engine);
    action.on_deactivating(&engine);

    let actor = ready_pawn(&instance);
    assert!(action.active_extensions(actor).is_none());
    assert_eq!(instance.component_manager().extension_handler_count(), 0);
}

#[test]
fn instances_started_after_activation_are_attached() {
    let engine = GameEngine::new();
    let action = AddAbilitiesAction::new(vec![jump_entry()]);
    action.on_activating(&engine);

    let instance = engine.create_instance(WorldKind::Game);
    register_assets(&instance);
    let actor = ready_pawn(&instance);

    assert_eq!(action.active_actor_count(), 1);
    assert!(action.active_extensions(actor).is_some());
}

#[test]
fn non_game_worlds_are_ignored() {
    let engine = GameEngine::new();
    let instance = engine.create_instance(WorldKind::Editor);
    register_assets(&instance);

    let action = AddAbilitiesAction::new(vec![jump_entry()]);
    action.on_activating(&engine);

    assert_eq!(instance.component_manager().extension_handler_count(), 0);
    let actor = ready_pawn(&instance);
    assert!(action.active_extensions(actor).is_none());
}

#[test]
fn actors_already_in_scope_are_granted_at_activation() {
    let (engine, instance) = game_setup();
    let manager = instance.component_manager();
    let actor = manager.spawn_actor(ActorClassName::from("Pawn"));
    manager.add_receiver(actor).expect("receiver");

    let action = AddAbilitiesAction::new(vec![jump_entry()]);
    action.on_activating(&engine);

    assert_eq!(action.active_actor_count(), 1, "handler replay granted the pawn");
    assert!(action.active_extensions(actor).is_some());
}

#[test]
fn feature_definition_drives_the_full_cycle() {
    let (engine, instance) = game_setup();
    let definition: GameFeatureDefinition = serde_json::from_str(
        r#"{
            "name": "hero_kit",
            "abilities": [
                {
                    "actor_class": "Pawn",
                    "abilities": [{ "ability_type": "/Game/Abilities/GA_Jump" }]
                }
            ]
        }"#,
    )
    .expect("valid definition");

    let mut feature = GameFeature::from_definition(definition);
    assert_eq!(feature.state(), GameFeatureState::Registered);

    assert!(feature.activate(&engine));
    let actor = ready_pawn(&instance);
    let manager = instance.component_manager();
    let host = manager
        .find_component::<AbilitySystemComponent>(actor)
        .expect("host");
    assert_eq!(host.lock().expect("host lock").grant_count(), 1);

    assert!(feature.deactivate(&engine));
    let host = host.lock().expect("host lock");
    assert_eq!(
        host.granted_handles()
            .iter()
            .filter(|handle| {
                host.grant(**handle).map(|grant| grant.state) == Some(AbilityGrantState::Active)
            })
            .count(),
        0,
        "no grant stays active after deactivation"
    );
}
