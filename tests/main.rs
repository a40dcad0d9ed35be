use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tether::{
	active, make_reactive, store, watch, App, CyclicStoreError, Dependency, Error, Expression, Node,
	Result, Store, Subscriber, Template, Tracking, Value, Watcher, WatcherOptions,
};


fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

#[derive(Default)]
struct Counter {
	hits: Cell<usize>,
}

impl Subscriber for Counter {
	fn update(&self) -> Result<()> {
		self.hits.set(self.hits.get() + 1);
		Ok(())
	}
}

fn subscriber<T: Subscriber>(rc: &Rc<T>) -> Weak<dyn Subscriber> {
	Rc::downgrade(rc) as Weak<dyn Subscriber>
}

fn counting_watcher(
	data: &Store,
	source: &str,
	tracking: Tracking,
) -> (Watcher, Rc<Cell<usize>>, Rc<RefCell<Vec<Value>>>) {
	let evaluations = Rc::new(Cell::new(0));
	let seen = Rc::new(RefCell::new(Vec::new()));
	let expression = Expression::compile(source).unwrap();

	let watcher = Watcher::with_options(
		data.clone(),
		WatcherOptions {
			tracking,
			label: Some(source.to_string()),
		},
		{
			let evaluations = evaluations.clone();
			move |scope: &Store| {
				evaluations.set(evaluations.get() + 1);
				expression.eval(scope)
			}
		},
		Some({
			let seen = seen.clone();
			move |value: &Value| seen.borrow_mut().push(value.clone())
		}),
	)
	.unwrap();

	(watcher, evaluations, seen)
}

#[test]
fn renders_template_and_follows_writes() {
	init_tracing();

	let data = store! { "msg" => "hi" };
	make_reactive(&data).unwrap();

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_render()
		.withf(|text| text == "say hi")
		.times(1)
		.return_const(());

	let template = Template::compile("say {{msg}}").unwrap();
	let watcher = Watcher::template(data.clone(), template, mock.callback()).unwrap();

	mock.get().checkpoint();

	mock.get()
		.expect_render()
		.withf(|text| text == "say bye")
		.times(1)
		.return_const(());

	data.set("msg", "bye").unwrap();
	data.set("msg", "bye").unwrap();

	mock.get().checkpoint();

	assert_eq!(watcher.value(), Value::from("say bye"));
}

#[test]
fn write_notifies_once_per_change() {
	let data = store! { "count" => 1 };
	make_reactive(&data).unwrap();

	let counter = Rc::new(Counter::default());
	let dependency = data.dependency("count").unwrap();
	dependency.register(subscriber(&counter));

	data.set("count", 1).unwrap();
	assert_eq!(counter.hits.get(), 0);

	data.set("count", 2).unwrap();
	assert_eq!(counter.hits.get(), 1);

	data.set("count", "2").unwrap();
	assert_eq!(counter.hits.get(), 2);
}

#[test]
fn nan_is_never_equal_to_itself() {
	let data = store! { "n" => f64::NAN };
	make_reactive(&data).unwrap();

	let counter = Rc::new(Counter::default());
	data.dependency("n")
		.unwrap()
		.register(subscriber(&counter));

	data.set("n", f64::NAN).unwrap();
	assert_eq!(counter.hits.get(), 1);
}

#[test]
fn registration_is_idempotent() {
	let data = store! { "x" => 0 };
	make_reactive(&data).unwrap();

	let counter = Rc::new(Counter::default());
	let dependency = data.dependency("x").unwrap();
	dependency.register(subscriber(&counter));
	dependency.register(subscriber(&counter));
	assert_eq!(dependency.len(), 1);

	dependency.notify_all().unwrap();
	assert_eq!(counter.hits.get(), 1);

	dependency.unregister(&subscriber(&counter));
	dependency.unregister(&subscriber(&counter));
	assert!(dependency.is_empty());

	dependency.notify_all().unwrap();
	assert_eq!(counter.hits.get(), 1);
}

#[test]
fn watcher_tracks_what_it_reads() {
	let data = store! { "a" => 1, "b" => 2, "unused" => 0 };
	make_reactive(&data).unwrap();

	let (watcher, evaluations, seen) = counting_watcher(&data, "a + b", Tracking::Accumulate);
	assert_eq!(evaluations.get(), 1);
	assert_eq!(*seen.borrow(), vec![Value::from(3)]);
	assert_eq!(watcher.dependency_count(), 2);
	assert!(data.dependency("unused").unwrap().is_empty());

	data.set("unused", 5).unwrap();
	assert_eq!(evaluations.get(), 1);

	data.set("a", 10).unwrap();
	assert_eq!(evaluations.get(), 2);
	assert_eq!(watcher.value(), Value::from(12));
	assert_eq!(*seen.borrow(), vec![Value::from(3), Value::from(12)]);
}

#[test]
fn callback_fires_only_on_change() {
	let data = store! { "flag" => 1 };
	make_reactive(&data).unwrap();

	let (watcher, evaluations, seen) =
		counting_watcher(&data, "flag ? 'yes' : 'no'", Tracking::Accumulate);

	// Re-evaluated, but the result is the same string.
	data.set("flag", 7).unwrap();
	assert_eq!(evaluations.get(), 2);
	assert_eq!(*seen.borrow(), vec![Value::from("yes")]);

	data.set("flag", 0).unwrap();
	assert_eq!(evaluations.get(), 3);
	assert_eq!(watcher.value(), Value::from("no"));
	assert_eq!(*seen.borrow(), vec![Value::from("yes"), Value::from("no")]);
}

#[test]
fn stale_branch_keeps_triggering_when_accumulating() {
	let data = store! { "cond" => true, "a" => "A", "b" => "B" };
	make_reactive(&data).unwrap();

	let (watcher, evaluations, _) =
		counting_watcher(&data, "cond ? a : b", Tracking::Accumulate);
	assert!(data.dependency("b").unwrap().is_empty());

	data.set("cond", false).unwrap();
	assert_eq!(watcher.value(), Value::from("B"));
	assert_eq!(evaluations.get(), 2);

	data.set("b", "B2").unwrap();
	assert_eq!(watcher.value(), Value::from("B2"));
	assert_eq!(evaluations.get(), 3);

	// `a` is no longer read but the old registration is still there.
	assert_eq!(data.dependency("a").unwrap().len(), 1);
	data.set("a", "A2").unwrap();
	assert_eq!(evaluations.get(), 4);
	assert_eq!(watcher.value(), Value::from("B2"));
}

#[test]
fn rebuild_drops_registrations_of_inactive_branch() {
	let data = store! { "cond" => true, "a" => "A", "b" => "B" };
	make_reactive(&data).unwrap();

	let (watcher, evaluations, _) = counting_watcher(&data, "cond ? a : b", Tracking::Rebuild);
	assert_eq!(watcher.tracking(), Tracking::Rebuild);

	data.set("cond", false).unwrap();
	assert!(data.dependency("a").unwrap().is_empty());
	assert_eq!(watcher.dependency_count(), 2);

	data.set("a", "A2").unwrap();
	assert_eq!(evaluations.get(), 2);

	data.set("b", "B2").unwrap();
	assert_eq!(evaluations.get(), 3);
	assert_eq!(watcher.value(), Value::from("B2"));

	data.set("cond", true).unwrap();
	assert_eq!(watcher.value(), Value::from("A2"));
	assert!(data.dependency("b").unwrap().is_empty());
}

#[test]
fn nested_stores_are_reactive() {
	let data = store! { "a" => store! { "b" => 1 } };
	make_reactive(&data).unwrap();

	let (watcher, _, seen) = counting_watcher(&data, "a.b", Tracking::Accumulate);

	let inner = data.get_once("a").unwrap();
	let inner = inner.as_store().unwrap();
	assert!(inner.is_reactive("b"));

	inner.set("b", 2).unwrap();
	assert_eq!(watcher.value(), Value::from(2));

	let replacement = store! { "b" => 3 };
	assert!(!replacement.is_reactive("b"));
	data.set("a", replacement.clone()).unwrap();
	assert!(replacement.is_reactive("b"));
	assert_eq!(watcher.value(), Value::from(3));

	replacement.set("b", 4).unwrap();
	assert_eq!(watcher.value(), Value::from(4));
	assert_eq!(data.get_path("a.b"), Some(Value::from(4)));

	assert_eq!(
		*seen.borrow(),
		vec![
			Value::from(1),
			Value::from(2),
			Value::from(3),
			Value::from(4)
		]
	);
}

#[test]
fn writing_the_same_store_is_a_no_op() {
	let child = store! { "x" => 1 };
	let data = store! { "child" => child.clone() };
	make_reactive(&data).unwrap();

	let counter = Rc::new(Counter::default());
	data.dependency("child")
		.unwrap()
		.register(subscriber(&counter));

	data.set("child", child).unwrap();
	assert_eq!(counter.hits.get(), 0);

	// Same contents, different identity.
	data.set("child", store! { "x" => 1 }).unwrap();
	assert_eq!(counter.hits.get(), 1);
}

#[test]
fn properties_added_later_are_plain() {
	let data = store! { "known" => 1 };
	make_reactive(&data).unwrap();

	data.set("late", 1).unwrap();
	assert!(data.is_reactive("known"));
	assert!(!data.is_reactive("late"));
	assert!(data.dependency("late").is_none());

	let (watcher, evaluations, _) = counting_watcher(&data, "late", Tracking::Accumulate);
	data.set("late", 2).unwrap();
	assert_eq!(evaluations.get(), 1);
	assert_eq!(watcher.value(), Value::from(1));

	// Running it again picks the new property up.
	make_reactive(&data).unwrap();
	assert!(data.is_reactive("late"));
	assert_eq!(data.get_once("late"), Some(Value::from(2)));
}

#[test]
fn make_reactive_is_idempotent() {
	let data = store! { "x" => 1 };
	make_reactive(&data).unwrap();

	let counter = Rc::new(Counter::default());
	data.dependency("x").unwrap().register(subscriber(&counter));

	make_reactive(&data).unwrap();
	data.set("x", 2).unwrap();
	assert_eq!(counter.hits.get(), 1);
}

#[test]
fn arrays_are_not_intercepted() {
	let data = store! { "list" => vec![Value::from(1), Value::from(2)] };
	make_reactive(&data).unwrap();

	let list = data.get_once("list").unwrap();
	assert!(list.as_store().is_none());
	assert_eq!(list.to_string(), "1,2");
}

#[test]
fn shared_children_are_fine() {
	let shared = store! { "v" => 1 };
	let data = store! { "left" => shared.clone(), "right" => shared.clone() };
	make_reactive(&data).unwrap();
	assert!(shared.is_reactive("v"));
}

#[test]
fn cycles_are_rejected_before_anything_changes() {
	let a = store! { "name" => "a" };
	let b = store! { "name" => "b" };
	a.set("child", b.clone()).unwrap();
	b.set("parent", a.clone()).unwrap();

	let error = make_reactive(&a).unwrap_err();
	assert_eq!(error.path, "child.parent");
	assert!(!a.is_reactive("name"));
	assert!(!b.is_reactive("name"));

	// Break the cycle so the stores can be freed.
	b.set("parent", Value::Null).unwrap();
	make_reactive(&a).unwrap();
}

#[test]
fn writing_a_cyclic_store_fails() {
	let data = store! { "slot" => Value::Null };
	make_reactive(&data).unwrap();

	let cyclic = store! {};
	cyclic.set("me", cyclic.clone()).unwrap();

	let error = data.set("slot", cyclic.clone()).unwrap_err();
	assert!(matches!(error, Error::Cyclic(_)));
	assert_eq!(data.get_once("slot"), Some(Value::Null));

	cyclic.set("me", Value::Null).unwrap();
}

#[test]
fn writes_leading_back_to_an_ancestor_fail() {
	let data = store! {
		"slot" => Value::Null,
		"inner" => store! { "deep" => Value::Null },
	};
	make_reactive(&data).unwrap();
	let (_watcher, evaluations, _) = counting_watcher(&data, "slot", Tracking::Accumulate);

	let error = data.set("slot", store! { "up" => data.clone() }).unwrap_err();
	assert_eq!(
		error,
		Error::Cyclic(CyclicStoreError {
			path: "slot.up".into()
		})
	);
	assert_eq!(data.get_once("slot"), Some(Value::Null));
	assert_eq!(evaluations.get(), 1);

	let inner = data.get_once("inner").unwrap().as_store().unwrap().clone();
	let error = inner.set("deep", store! { "root" => data.clone() }).unwrap_err();
	assert_eq!(
		error,
		Error::Cyclic(CyclicStoreError {
			path: "deep.root.inner".into()
		})
	);
	assert_eq!(inner.get_once("deep"), Some(Value::Null));

	// Sharing a sibling is not a cycle.
	data.set("slot", store! { "peer" => inner.clone() }).unwrap();
	assert_eq!(evaluations.get(), 2);
}

#[test]
fn failed_evaluation_releases_active_slot() {
	let data = store! { "present" => 1 };
	make_reactive(&data).unwrap();

	let error = Watcher::expression(
		data.clone(),
		Expression::compile("present + missing").unwrap(),
		|_: &Value| {},
	)
	.unwrap_err();
	assert_eq!(error, Error::UndefinedVariable("missing".into()));
	assert!(!active::is_tracking());

	// The failed watcher is gone and must not linger in the registry.
	assert!(data.dependency("present").unwrap().is_empty());

	let counter = Rc::new(Counter::default());
	data.dependency("present")
		.unwrap()
		.register(subscriber(&counter));
	assert_eq!(data.get("present"), Some(Value::from(1)));
	assert_eq!(data.dependency("present").unwrap().len(), 1);
}

#[test]
fn reads_outside_evaluation_are_not_tracked() {
	let data = store! { "x" => 1 };
	make_reactive(&data).unwrap();

	assert!(!active::is_tracking());
	assert_eq!(data.get("x"), Some(Value::from(1)));
	assert!(data.dependency("x").unwrap().is_empty());
}

#[test]
fn dropped_watcher_is_not_notified() {
	let data = store! { "x" => 1 };
	make_reactive(&data).unwrap();

	let (watcher, evaluations, _) = counting_watcher(&data, "x", Tracking::Accumulate);
	assert_eq!(watcher.label(), "x");
	let dependency = data.dependency("x").unwrap();
	let handle = watcher.as_subscriber();
	assert_eq!(dependency.len(), 1);
	assert!(dependency.contains(&handle));

	std::mem::drop(watcher);
	assert!(!dependency.contains(&handle));
	assert!(dependency.is_empty());

	data.set("x", 2).unwrap();
	assert_eq!(evaluations.get(), 1);
}

#[derive(Default)]
struct Failing;

impl Subscriber for Failing {
	fn update(&self) -> Result<()> {
		Err(Error::UndefinedVariable("boom".into()))
	}
}

#[test]
fn failing_subscriber_does_not_block_others() {
	let data = store! { "x" => 1 };
	make_reactive(&data).unwrap();

	let failing = Rc::new(Failing);
	let counter = Rc::new(Counter::default());
	let dependency = data.dependency("x").unwrap();
	dependency.register(subscriber(&failing));
	dependency.register(subscriber(&counter));

	let error = data.set("x", 2).unwrap_err();
	assert_eq!(error, Error::UndefinedVariable("boom".into()));
	assert_eq!(counter.hits.get(), 1);
	assert_eq!(data.get_once("x"), Some(Value::from(2)));
}

struct Recruiter {
	dependency: Rc<Dependency>,
	recruit: Rc<Counter>,
}

impl Subscriber for Recruiter {
	fn update(&self) -> Result<()> {
		self.dependency.register(subscriber(&self.recruit));
		Ok(())
	}
}

#[test]
fn subscribers_added_during_notification_wait_for_next_write() {
	let data = store! { "x" => 1 };
	make_reactive(&data).unwrap();

	let dependency = data.dependency("x").unwrap();
	let recruit = Rc::new(Counter::default());
	let recruiter = Rc::new(Recruiter {
		dependency: dependency.clone(),
		recruit: recruit.clone(),
	});
	dependency.register(subscriber(&recruiter));

	data.set("x", 2).unwrap();
	assert_eq!(recruit.hits.get(), 0);

	data.set("x", 3).unwrap();
	assert_eq!(recruit.hits.get(), 1);
}

struct Evictor {
	dependency: Rc<Dependency>,
	victim: Weak<dyn Subscriber>,
}

impl Subscriber for Evictor {
	fn update(&self) -> Result<()> {
		self.dependency.unregister(&self.victim);
		Ok(())
	}
}

#[test]
fn subscribers_removed_during_notification_still_get_the_current_write() {
	let data = store! { "x" => 1 };
	make_reactive(&data).unwrap();

	let dependency = data.dependency("x").unwrap();
	let victim = Rc::new(Counter::default());
	let evictor = Rc::new(Evictor {
		dependency: dependency.clone(),
		victim: subscriber(&victim),
	});
	dependency.register(subscriber(&evictor));
	dependency.register(subscriber(&victim));

	// Whichever of the two runs first, the victim was part of this round.
	data.set("x", 2).unwrap();
	assert_eq!(victim.hits.get(), 1);
	assert!(!dependency.contains(&subscriber(&victim)));
	assert_eq!(dependency.len(), 1);

	data.set("x", 3).unwrap();
	assert_eq!(victim.hits.get(), 1);
}

#[test]
fn watcher_labels_default_to_unnamed() {
	let data = store! { "x" => 1 };
	make_reactive(&data).unwrap();

	let plain = Watcher::new(
		data.clone(),
		|scope: &Store| Ok(scope.get("x").unwrap_or_default()),
		|_: &Value| {},
	)
	.unwrap();
	assert_eq!(plain.label(), "<unnamed>");

	let expression = Watcher::expression(
		data.clone(),
		Expression::compile("x + 1").unwrap(),
		|_: &Value| {},
	)
	.unwrap();
	assert_eq!(expression.label(), "x + 1");
	assert!(data.dependency("x").unwrap().contains(&expression.as_subscriber()));
}

#[test]
fn callback_may_write_unrelated_properties() {
	let data = store! { "source" => 1, "mirror" => 0 };
	make_reactive(&data).unwrap();

	let _copy = Watcher::expression(
		data.clone(),
		Expression::compile("source").unwrap(),
		{
			let data = data.clone();
			move |value: &Value| data.set("mirror", value.clone()).unwrap()
		},
	)
	.unwrap();

	let (mirror, _, _) = counting_watcher(&data, "mirror", Tracking::Accumulate);
	assert_eq!(mirror.value(), Value::from(1));

	data.set("source", 7).unwrap();
	assert_eq!(mirror.value(), Value::from(7));
}

#[test]
fn watch_macro_clones_captures() {
	let data = store! { "first" => "Ada", "last" => "Lovelace" };
	make_reactive(&data).unwrap();

	let separator = Rc::new(String::from(" "));
	let full = Rc::new(RefCell::new(String::new()));

	let _watcher = watch!(
		data.clone(),
		(separator) scope => {
			let first = scope.get("first").unwrap_or_default();
			let last = scope.get("last").unwrap_or_default();
			Ok(Value::from(format!("{}{}{}", first, separator, last)))
		},
		{
			let full = full.clone();
			move |value: &Value| *full.borrow_mut() = value.to_string()
		}
	)
	.unwrap();

	assert_eq!(*full.borrow(), "Ada Lovelace");
	data.set("last", "Byron").unwrap();
	assert_eq!(*full.borrow(), "Ada Byron");
	assert_eq!(Rc::strong_count(&separator), 2);
}

#[test]
fn null_result_does_not_fire_initially() {
	let data = store! { "x" => Value::Null };
	make_reactive(&data).unwrap();

	let (watcher, evaluations, seen) = counting_watcher(&data, "x", Tracking::Accumulate);
	assert_eq!(evaluations.get(), 1);
	assert!(seen.borrow().is_empty());

	data.set("x", 1).unwrap();
	assert_eq!(watcher.value(), Value::from(1));
	assert_eq!(*seen.borrow(), vec![Value::from(1)]);
}

#[test]
fn app_renders_and_updates_tree() {
	init_tracing();

	let data = store! {
		"title" => "Todo",
		"user" => store! { "name" => "ann" },
		"done" => 1,
		"total" => 3,
	};
	let root = Node::element(
		"div",
		vec![
			Node::element("h1", vec![Node::text("{{ title }}")]),
			Node::element(
				"p",
				vec![
					Node::text("hello {{user.name}}, "),
					Node::element("b", vec![Node::text("{{done}}/{{total}} done")]),
				],
			),
			Node::text("static"),
		],
	);

	let app = App::mount(data, root).unwrap();
	assert_eq!(app.watchers().len(), 3);
	assert_eq!(app.render(), "Todohello ann, 1/3 donestatic");

	app.set("done", 2).unwrap();
	assert_eq!(app.render(), "Todohello ann, 2/3 donestatic");

	app.set("user", store! { "name" => "bob" }).unwrap();
	assert_eq!(app.render(), "Todohello bob, 2/3 donestatic");

	let user = app.get("user").unwrap();
	user.as_store().unwrap().set("name", "cy").unwrap();
	assert_eq!(app.render(), "Todohello cy, 2/3 donestatic");
}

#[test]
fn app_mount_reports_bad_templates() {
	let root = Node::element("p", vec![Node::text("{{ nope }}")]);
	let error = App::mount(store! { "x" => 1 }, root).unwrap_err();
	assert_eq!(error, Error::UndefinedVariable("nope".into()));
}
