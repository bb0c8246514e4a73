//! Stress tests for the shared world under concurrent sessions
//!
//! These drive `World` directly from many tasks on a multi-threaded runtime.

use server::error::ActionError;
use server::farm::GameRules;
use server::world::World;
use shared::{PlotState, HARVEST_REWARD, STARTING_COINS};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Plants (0, 0) on the victim's farm, ripens it and sends the victim away
async fn ripe_absent_victim(world: &World) -> (server::world::Login, server::world::Login) {
    let victim = world.login(None).await;
    let elsewhere = world.login(None).await;
    world.plant(victim.session_id, 0, 0).await.unwrap();

    let farm = world.farm(&victim.player_id).await.unwrap();
    farm.tick_grow_at(Instant::now() + Duration::from_secs(3600));
    assert_eq!(farm.snapshot()[0][0], PlotState::Ripe);

    world
        .set_view(victim.session_id, &elsewhere.player_id)
        .await
        .unwrap();
    (victim, elsewhere)
}

/// Many thieves on one plot never take more than its yield in total
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_steals_conserve_yield() {
    let world = Arc::new(World::new(GameRules::default()));
    let (victim, _) = ripe_absent_victim(&world).await;

    let mut thieves = Vec::new();
    for _ in 0..16 {
        let thief = world.login(None).await;
        world
            .set_view(thief.session_id, &victim.player_id)
            .await
            .unwrap();
        thieves.push(thief);
    }

    let mut handles = Vec::new();
    for thief in &thieves {
        let world = Arc::clone(&world);
        let session = thief.session_id;
        handles.push(tokio::spawn(async move {
            let mut taken = 0;
            for _ in 0..50 {
                if let Ok(amount) = world.steal(session, 0, 0).await {
                    taken += amount;
                }
                tokio::task::yield_now().await;
            }
            taken
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }

    let farm = world.farm(&victim.player_id).await.unwrap();
    let remaining = farm.remaining_yield(0, 0).unwrap();
    assert!(total <= HARVEST_REWARD);
    assert_eq!(remaining + total, HARVEST_REWARD);

    // Every coin that left the plot landed in exactly one thief's balance
    let mut credited = 0;
    for thief in &thieves {
        let coins = world.farm(&thief.player_id).await.unwrap().coins();
        assert!(coins >= STARTING_COINS);
        credited += coins - STARTING_COINS;
    }
    assert_eq!(credited, total);
}

/// Simultaneous new logins always mint distinct players
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_get_distinct_ids() {
    let world = Arc::new(World::new(GameRules::default()));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let world = Arc::clone(&world);
        handles.push(tokio::spawn(async move { world.login(None).await.player_id }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()));
    }

    assert_eq!(world.farm_count().await, 64);
    assert_eq!(world.session_count().await, 64);
    assert_eq!(world.roster().await.len(), 64);
}

/// Sessions hopping between farms always end up viewing exactly one existing farm
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_view_switches_stay_consistent() {
    let world = Arc::new(World::new(GameRules::default()));
    let mut sessions = Vec::new();
    for _ in 0..8 {
        sessions.push(world.login(None).await);
    }
    let ids: Vec<String> = sessions.iter().map(|s| s.player_id.clone()).collect();

    let mut handles = Vec::new();
    for (n, login) in sessions.iter().enumerate() {
        let world = Arc::clone(&world);
        let ids = ids.clone();
        let session = login.session_id;
        handles.push(tokio::spawn(async move {
            for step in 0..100 {
                let target = &ids[(n + step) % ids.len()];
                world.set_view(session, target).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let roster = world.roster().await;
    for login in &sessions {
        let viewing = world.viewing(login.session_id).await.unwrap();
        assert!(ids.contains(&viewing));
        assert_eq!(roster.get(&login.player_id), Some(&viewing));
    }
}

/// While the owner looks at their own farm, every concurrent steal is refused
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn owner_at_home_refuses_all_thieves() {
    let world = Arc::new(World::new(GameRules::default()));
    let (victim, _) = ripe_absent_victim(&world).await;
    world
        .set_view(victim.session_id, &victim.player_id)
        .await
        .unwrap();

    let mut thieves = Vec::new();
    for _ in 0..16 {
        let thief = world.login(None).await;
        world
            .set_view(thief.session_id, &victim.player_id)
            .await
            .unwrap();
        thieves.push(thief);
    }

    let mut handles = Vec::new();
    for thief in &thieves {
        let world = Arc::clone(&world);
        let session = thief.session_id;
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                assert_eq!(
                    world.steal(session, 0, 0).await,
                    Err(ActionError::OwnerIsHome)
                );
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let farm = world.farm(&victim.player_id).await.unwrap();
    assert_eq!(farm.remaining_yield(0, 0), Some(HARVEST_REWARD));
    for thief in &thieves {
        let coins = world.farm(&thief.player_id).await.unwrap().coins();
        assert_eq!(coins, STARTING_COINS);
    }
}

/// A victim coming home races thieves; stolen coins still balance the plot
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn steals_racing_owner_return_conserve_yield() {
    let world = Arc::new(World::new(GameRules::default()));
    let (victim, elsewhere) = ripe_absent_victim(&world).await;

    let mut thieves = Vec::new();
    for _ in 0..4 {
        let thief = world.login(None).await;
        world
            .set_view(thief.session_id, &victim.player_id)
            .await
            .unwrap();
        thieves.push(thief);
    }

    let mover = {
        let world = Arc::clone(&world);
        let home = victim.player_id.clone();
        let away = elsewhere.player_id.clone();
        let session = victim.session_id;
        tokio::spawn(async move {
            for step in 0..50 {
                let target = if step % 2 == 0 { &home } else { &away };
                world.set_view(session, target).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut handles = Vec::new();
    for thief in &thieves {
        let world = Arc::clone(&world);
        let session = thief.session_id;
        handles.push(tokio::spawn(async move {
            let mut taken = 0;
            for _ in 0..50 {
                if let Ok(amount) = world.steal(session, 0, 0).await {
                    taken += amount;
                }
                tokio::task::yield_now().await;
            }
            taken
        }));
    }

    mover.await.unwrap();
    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }

    let farm = world.farm(&victim.player_id).await.unwrap();
    assert_eq!(farm.remaining_yield(0, 0).unwrap() + total, HARVEST_REWARD);
    assert_eq!(farm.snapshot()[0][0], PlotState::Ripe);
}

/// Logouts during activity leave no dangling sessions behind
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logouts_clear_registries() {
    let world = Arc::new(World::new(GameRules::default()));
    let mut handles = Vec::new();
    for _ in 0..32 {
        let world = Arc::clone(&world);
        handles.push(tokio::spawn(async move {
            let login = world.login(None).await;
            world.plant(login.session_id, 1, 1).await.unwrap();
            assert!(world.logout(login.session_id).await);
            login.player_id
        }));
    }

    for handle in handles {
        let id = handle.await.unwrap();
        // Farms outlive their sessions
        assert!(world.farm(&id).await.is_some());
    }
    assert_eq!(world.session_count().await, 0);
    assert!(world.roster().await.is_empty());
    assert_eq!(world.farm_count().await, 32);
}
