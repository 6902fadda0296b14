mod common;

use common::{drain, next, recorder, BackendCall, Harness};

use std::{
	path::{Path, PathBuf},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use notify::{event::RemoveKind, EventKind};
use tokio::sync::mpsc;
use tracing_test::traced_test;
use wsa_fs_watcher::{Callbacks, WatchEventKind};

#[tokio::test]
#[traced_test]
async fn directory_watch_is_reference_counted() {
	let harness = Harness::new("/ws");
	let registry = harness.manager.registry();

	let ids = ["a.txt", "b.txt", "c.txt"]
		.into_iter()
		.map(|name| {
			harness
				.manager
				.register_by_path(Path::new("/ws/p").join(name), Callbacks::noop())
		})
		.collect::<Vec<_>>();

	assert_eq!(registry.reference_count("/ws/p"), 3);
	assert_eq!(harness.calls(), vec![BackendCall::Watch("/ws/p".into())]);

	for id in &ids[..2] {
		assert!(harness.manager.unregister_by_path(*id));
	}
	assert_eq!(registry.reference_count("/ws/p"), 1);
	assert_eq!(harness.calls().len(), 1);

	assert!(harness.manager.unregister_by_path(ids[2]));
	assert_eq!(
		harness.calls(),
		vec![
			BackendCall::Watch("/ws/p".into()),
			BackendCall::Unwatch("/ws/p".into())
		]
	);
	assert!(registry.watched_directories().is_empty());

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn modify_callback_only_sees_its_file() {
	let root = tempfile::tempdir().unwrap();
	let file = root.path().join("file.txt");
	std::fs::write(&file, b"v1").unwrap();
	let file_str = file.to_str().unwrap().to_string();

	let harness = Harness::new(root.path());
	let (tx, mut rx) = mpsc::unbounded_channel();

	let id = harness.manager.register_by_path(
		&file,
		Callbacks::new().on_modify(move |path| {
			tx.send((WatchEventKind::Modify, path.to_string())).unwrap();
		}),
	);

	harness.emit_modify(&file);
	harness.emit_modify(root.path().join("other.txt"));
	assert_eq!(next(&mut rx).await, (WatchEventKind::Modify, file_str));

	// No delete callback was given, the event is simply not delivered
	harness.emit_remove(&file);
	harness.flush().await;
	assert!(drain(&mut rx).is_empty());

	assert!(harness.manager.unregister_by_path(id));
	assert_eq!(harness.manager.path_table().subscription_count(), 0);
	assert!(harness.manager.registry().watched_directories().is_empty());

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn events_while_suspended_are_dropped_not_queued() {
	let harness = Harness::new("/ws");
	let (callbacks, mut rx) = recorder();
	harness
		.manager
		.register_by_path("/ws/p/a.txt", callbacks);

	harness.manager.suspend();
	harness.manager.suspend();
	assert!(harness.manager.is_suspended());

	harness.emit_modify("/ws/p/a.txt");
	harness.emit_remove("/ws/p/a.txt");

	harness.manager.resume();
	harness.flush().await;
	assert!(drain(&mut rx).is_empty());

	// Registrations survived the suspension
	harness.emit_modify("/ws/p/a.txt");
	assert_eq!(
		next(&mut rx).await,
		(WatchEventKind::Modify, "/ws/p/a.txt".to_string())
	);

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn directory_removed_while_suspended_is_still_purged() {
	let root = tempfile::tempdir().unwrap();
	let dir = root.path().join("sub");
	std::fs::create_dir(&dir).unwrap();

	let harness = Harness::new(root.path());
	harness.manager.register_by_path(&dir, Callbacks::noop());

	harness.manager.suspend();
	std::fs::remove_dir(&dir).unwrap();
	std::fs::create_dir(&dir).unwrap();
	harness.emit(EventKind::Remove(RemoveKind::Folder), &dir);
	harness.manager.resume();
	harness.flush().await;

	assert_eq!(harness.manager.registry().reference_count(&dir), 0);

	// A new subscription gets a fresh native watch instead of the dead one
	let file = dir.join("new.txt");
	let (callbacks, mut rx) = recorder();
	harness.manager.register_by_path(&file, callbacks);
	assert_eq!(harness.manager.registry().reference_count(&dir), 1);
	assert_eq!(
		harness.calls(),
		vec![
			BackendCall::Watch(dir.clone()),
			BackendCall::Unwatch(dir.clone()),
			BackendCall::Watch(dir.clone()),
		]
	);

	harness.emit_modify(&file);
	assert_eq!(
		next(&mut rx).await,
		(WatchEventKind::Modify, file.to_str().unwrap().to_string())
	);

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn subscribers_seeing_through_excludes_get_excluded_events() {
	let harness = Harness::new("/a");
	let (callbacks, mut rx) = recorder();
	let (exempt_callbacks, mut exempt_rx) = recorder();

	harness.manager.register_by_path("/a/.che/rules", callbacks);
	harness
		.manager
		.register_by_path("/a/.che/rules", exempt_callbacks.see_excluded());
	harness
		.manager
		.excludes()
		.replace("/a", [PathBuf::from("/a")].into());

	harness.emit_modify("/a/.che/rules");

	assert_eq!(
		next(&mut exempt_rx).await,
		(WatchEventKind::Modify, "/a/.che/rules".to_string())
	);
	harness.flush().await;
	assert!(drain(&mut rx).is_empty());

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn excluded_paths_never_reach_callbacks() {
	let harness = Harness::new("/a");
	let (callbacks, mut rx) = recorder();
	let (other_callbacks, mut other_rx) = recorder();

	harness.manager.register_by_path("/a/b/c/d", callbacks);
	harness.manager.register_by_path("/a/c", other_callbacks);
	harness
		.manager
		.excludes()
		.replace("/a", [PathBuf::from("/a/b")].into());

	assert!(harness.manager.excludes().is_excluded("/a/b/c/d"));
	assert!(!harness.manager.excludes().is_excluded("/a/c"));

	harness.emit_modify("/a/b/c/d");
	harness.emit_modify("/a/c");

	assert_eq!(
		next(&mut other_rx).await,
		(WatchEventKind::Modify, "/a/c".to_string())
	);
	harness.flush().await;
	assert!(drain(&mut rx).is_empty());

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn refused_native_watch_does_not_steal_references() {
	let harness = Harness::new("/ws");
	let registry = harness.manager.registry();

	harness.refuse("/ws/gone");
	let refused = harness
		.manager
		.register_by_path("/ws/gone/a.txt", Callbacks::noop());
	assert_eq!(registry.reference_count("/ws/gone"), 0);
	assert!(harness.calls().is_empty());
	assert!(logs_contain("Unable to watch directory"));

	harness.allow("/ws/gone");
	let accepted = harness
		.manager
		.register_by_path("/ws/gone/b.txt", Callbacks::noop());
	assert_eq!(registry.reference_count("/ws/gone"), 1);

	assert!(harness.manager.unregister_by_path(refused));
	assert_eq!(registry.reference_count("/ws/gone"), 1);
	assert_eq!(harness.calls(), vec![BackendCall::Watch("/ws/gone".into())]);

	assert!(harness.manager.unregister_by_path(accepted));
	assert_eq!(registry.reference_count("/ws/gone"), 0);

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn panicking_callback_does_not_stop_delivery() {
	let harness = Harness::new("/ws");
	let (tx, mut rx) = mpsc::unbounded_channel();
	let panicked = Arc::new(AtomicBool::new(false));

	harness.manager.register_by_path(
		"/ws/p/a.txt",
		Callbacks::new().on_modify({
			let panicked = Arc::clone(&panicked);
			move |path| {
				if !panicked.swap(true, Ordering::SeqCst) {
					panic!("callback blew up");
				}
				tx.send((WatchEventKind::Modify, path.to_string())).unwrap();
			}
		}),
	);

	harness.emit_modify("/ws/p/a.txt");
	harness.emit_modify("/ws/p/a.txt");

	assert_eq!(
		next(&mut rx).await,
		(WatchEventKind::Modify, "/ws/p/a.txt".to_string())
	);
	assert!(panicked.load(Ordering::SeqCst));

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn deleted_directory_is_purged() {
	let root = tempfile::tempdir().unwrap();
	let dir = root.path().join("src");
	std::fs::create_dir(&dir).unwrap();

	let harness = Harness::new(root.path());
	let (callbacks, mut rx) = recorder();
	let id = harness.manager.register_by_path(&dir, callbacks);
	assert_eq!(harness.manager.registry().reference_count(&dir), 1);

	std::fs::remove_dir(&dir).unwrap();
	harness.emit(EventKind::Remove(RemoveKind::Folder), &dir);

	assert_eq!(
		next(&mut rx).await,
		(WatchEventKind::Delete, dir.to_str().unwrap().to_string())
	);
	assert_eq!(harness.manager.registry().reference_count(&dir), 0);
	assert_eq!(
		harness.calls(),
		vec![BackendCall::Watch(dir.clone()), BackendCall::Unwatch(dir.clone())]
	);

	// Its reference is already gone, releasing the subscription is quiet
	assert!(harness.manager.unregister_by_path(id));
	assert_eq!(harness.calls().len(), 2);

	harness.manager.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn shutdown_cancels_every_watch_and_is_idempotent() {
	let harness = Harness::new("/ws");

	harness
		.manager
		.register_by_path("/ws/p/a.txt", Callbacks::noop());
	harness
		.manager
		.register_by_path("/ws/q/b.txt", Callbacks::noop());

	harness.manager.shutdown().await;
	harness.manager.shutdown().await;

	let calls = harness.calls();
	assert!(calls.contains(&BackendCall::Unwatch("/ws/p".into())));
	assert!(calls.contains(&BackendCall::Unwatch("/ws/q".into())));
	assert!(harness.manager.registry().watched_directories().is_empty());

	// The registry is closed now
	harness
		.manager
		.register_by_path("/ws/r/c.txt", Callbacks::noop());
	assert!(harness.manager.registry().watched_directories().is_empty());
}
