use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use wirebox_core::{
    parse_dependency_list, Binding, BoxError, Container, ContainerError, ContainerErrorKind,
    ContainerResult, Instance,
};

#[derive(Debug)]
struct Config {
    url: String,
}

#[derive(Debug)]
struct Logger {
    prefix: String,
}

struct Repository {
    config: Rc<Config>,
    logger: Rc<Logger>,
}

#[derive(Debug)]
struct Unavailable;

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend unavailable")
    }
}

impl std::error::Error for Unavailable {}

fn counting_constructor(counter: Rc<Cell<u32>>) -> Binding {
    Binding::constructor(Vec::<String>::new(), move |_| {
        counter.set(counter.get() + 1);
        counter.get()
    })
}

#[test]
fn shared_binding_returns_identical_instance() {
    let mut container = Container::new();
    let built = Rc::new(Cell::new(0));
    container.bind("counter", counting_constructor(Rc::clone(&built)));

    let first = container.make("counter").expect("first make");
    let second = container.make("counter").expect("second make");

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(built.get(), 1);
    assert!(container.is_resolved("counter"));
}

#[test]
fn transient_binding_builds_fresh_instance_each_time() {
    let mut container = Container::new();
    let built = Rc::new(Cell::new(0));
    container.bind_transient("counter", counting_constructor(Rc::clone(&built)));

    let first = container.make_as::<u32>("counter").expect("first make");
    let second = container.make_as::<u32>("counter").expect("second make");

    assert!(!Rc::ptr_eq(&first, &second));
    assert_eq!((*first, *second), (1, 2));
    assert!(!container.is_resolved("counter"));
    assert!(!container.can_share("counter"));
}

#[test]
fn rebound_always_constructs_new_instance() {
    let mut container = Container::new();
    let built = Rc::new(Cell::new(0));
    container.bind("counter", counting_constructor(Rc::clone(&built)));

    let cached = container.make("counter").expect("make");
    let fresh = container.rebound("counter").expect("rebound");
    let after = container.make("counter").expect("make after rebound");

    assert!(!Rc::ptr_eq(&cached, &fresh));
    assert!(Rc::ptr_eq(&fresh, &after));
    assert_eq!(built.get(), 2);
}

#[test]
fn dependencies_resolve_in_declared_order_and_arrive_positionally() {
    let mut container = Container::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let config_order = Rc::clone(&order);
    container.bind(
        "config",
        Binding::constructor(Vec::<String>::new(), move |_| {
            config_order.borrow_mut().push("config");
            Config {
                url: "sqlite://memory".to_string(),
            }
        }),
    );
    let logger_order = Rc::clone(&order);
    container.bind(
        "logger",
        Binding::constructor(Vec::<String>::new(), move |_| {
            logger_order.borrow_mut().push("logger");
            Logger {
                prefix: "repo".to_string(),
            }
        }),
    );
    container.bind(
        "repository",
        Binding::constructor(parse_dependency_list("(config, /* sink */ logger)"), |args| {
            Repository {
                config: args.get::<Config>(0).expect("config at position 0"),
                logger: args.get::<Logger>(1).expect("logger at position 1"),
            }
        }),
    );

    let repository = container
        .make_as::<Repository>("repository")
        .expect("repository should resolve");

    assert_eq!(*order.borrow(), vec!["config", "logger"]);
    assert_eq!(repository.config.url, "sqlite://memory");
    assert_eq!(repository.logger.prefix, "repo");

    let config = container.make_as::<Config>("config").expect("config");
    assert!(Rc::ptr_eq(&config, &repository.config));
}

#[test]
fn sibling_dependencies_on_same_alias_do_not_collide() {
    let mut container = Container::new();
    container.bind("config", Binding::value(Config { url: "x".to_string() }));
    container.bind(
        "left",
        Binding::constructor(["config"], |args| args.get::<Config>(0).is_some()),
    );
    container.bind(
        "right",
        Binding::constructor(["config"], |args| args.get::<Config>(0).is_some()),
    );
    container.bind(
        "root",
        Binding::constructor(["left", "right", "config"], |args| args.len()),
    );

    let root = container.make_as::<usize>("root").expect("diamond graph resolves");
    assert_eq!(*root, 3);
}

#[test]
fn circular_dependency_fails_before_second_instantiation() {
    let mut container = Container::new();
    let built = Rc::new(RefCell::new(Vec::new()));

    let a_built = Rc::clone(&built);
    container.bind(
        "a",
        Binding::constructor(["b"], move |_| a_built.borrow_mut().push("a")),
    );
    let b_built = Rc::clone(&built);
    container.bind(
        "b",
        Binding::constructor(["a"], move |_| b_built.borrow_mut().push("b")),
    );

    let err = container.make("a").expect_err("a -> b -> a must fail");
    assert_eq!(err.kind(), ContainerErrorKind::CircularDependency);
    assert_eq!(err.name(), "Container Circular Dependency Exception");
    assert!(err.message().contains("a -> b -> a"));
    assert!(built.borrow().is_empty());
    assert!(!container.is_resolved("a"));
    assert!(!container.is_resolved("b"));
}

#[test]
fn self_dependency_is_circular() {
    let mut container = Container::new();
    container.bind("loop", Binding::constructor(["loop"], |_| ()));

    let err = container.make("loop").expect_err("self dependency must fail");
    assert_eq!(err.kind(), ContainerErrorKind::CircularDependency);
    assert!(err.message().contains("loop -> loop"));
}

#[test]
fn un_bind_then_make_fails_with_binding_error() {
    let mut container = Container::named("App");
    container.bind("mailer", Binding::value("smtp"));
    container.make("mailer").expect("mailer resolves while bound");

    container.un_bind("mailer");
    container.un_bind("mailer");

    assert!(!container.is_bound("mailer"));
    assert!(!container.is_resolved("mailer"));
    let err = container.make("mailer").expect_err("unbound alias must fail");
    assert_eq!(err.kind(), ContainerErrorKind::Binding);
    assert_eq!(err.name(), "App Binding Exception");
    assert!(err.message().contains("mailer"));
}

#[test]
fn factory_producing_nothing_is_a_binding_error() {
    let mut container = Container::new();
    container.bind("empty", Binding::factory(Vec::<String>::new(), |_| Ok(None)));

    let err = container.make("empty").expect_err("empty factory must fail");
    assert_eq!(err.kind(), ContainerErrorKind::Binding);
    assert!(err.message().contains("empty"));
}

#[test]
fn factory_error_is_reported_as_instantiation_with_source() {
    let mut container = Container::new();
    container.bind(
        "backend",
        Binding::factory(Vec::<String>::new(), |_| Err(Box::new(Unavailable) as BoxError)),
    );

    let err = container.make("backend").expect_err("failing factory must fail");
    assert_eq!(err.kind(), ContainerErrorKind::Instantiation);
    let source = std::error::Error::source(&err).expect("factory error is kept");
    assert_eq!(source.to_string(), "backend unavailable");
}

#[test]
fn factory_uses_required_arguments() {
    let mut container = Container::new();
    container.bind("port", Binding::value(8080_u16));
    container.bind(
        "address",
        Binding::factory(["port"], |args| {
            let port = args.require::<u16>(0)?;
            Ok(Some(Rc::new(format!("127.0.0.1:{port}")) as Instance))
        }),
    );
    container.bind(
        "broken",
        Binding::factory(["port"], |args| {
            let port = args.require::<String>(0)?;
            Ok(Some(Rc::new(port.len()) as Instance))
        }),
    );

    let address = container.make_as::<String>("address").expect("address");
    assert_eq!(address.as_str(), "127.0.0.1:8080");

    let err = container.make("broken").expect_err("type mismatch in factory");
    assert_eq!(err.kind(), ContainerErrorKind::Instantiation);
}

#[test]
fn destroy_reports_whether_an_instance_existed() {
    let mut container = Container::new();
    container.bind("clock", Binding::value(0_u64));

    assert!(!container.destroy("clock"));
    container.make("clock").expect("clock");
    assert!(container.destroy("clock"));
    assert!(!container.is_resolved("clock"));
    assert!(container.is_bound("clock"));
}

#[test]
fn set_instance_bypasses_resolution() {
    let mut container = Container::new();
    container.bind(
        "session",
        Binding::constructor(Vec::<String>::new(), |_| "constructed"),
    );
    let injected = container.set_instance("session", Rc::new("injected"));

    let made = container.make("session").expect("session");
    assert!(Rc::ptr_eq(&injected, &made));
    assert_eq!(*made.downcast::<&'static str>().expect("str"), "injected");
}

struct Fallback;

impl wirebox_core::ErrorHandler for Fallback {
    fn handle(&self, error: ContainerError) -> ContainerResult<Instance> {
        match error.kind() {
            ContainerErrorKind::Binding => Ok(Rc::new(format!("fallback for {}", error.name()))),
            _ => Err(error),
        }
    }
}

#[test]
fn handler_value_replaces_failed_resolution() {
    let mut container = Container::new();
    container.error_handler(Fallback);

    let value = container
        .make_as::<String>("missing")
        .expect("handler should recover");
    assert_eq!(value.as_str(), "fallback for Container Binding Exception");
    assert!(!container.is_resolved("missing"));
}

#[test]
fn handler_value_substitutes_failed_dependency_at_its_site() {
    let mut container = Container::new();
    container.error_handler(Fallback);
    container.bind(
        "greeter",
        Binding::constructor(["name"], |args| {
            format!("hello {}", args.get::<String>(0).expect("substituted name"))
        }),
    );

    let greeter = container.make_as::<String>("greeter").expect("greeter");
    assert_eq!(
        greeter.as_str(),
        "hello fallback for Container Binding Exception"
    );
}

#[test]
fn handler_re_raise_propagates_once() {
    let mut container = Container::new();
    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    container.error_handler(move |error: ContainerError| -> ContainerResult<Instance> {
        counter.set(counter.get() + 1);
        Err(error)
    });
    container.bind("a", Binding::constructor(["b"], |_| ()));
    container.bind("b", Binding::constructor(["a"], |_| ()));

    let err = container.make("a").expect_err("re-raised error reaches caller");
    assert_eq!(err.kind(), ContainerErrorKind::CircularDependency);
    assert_eq!(seen.get(), 1);
}

#[test]
fn debug_trace_collects_operation_lines() {
    let mut container = Container::new();
    container.debug(true);
    container.bind("answer", Binding::value(42_u8));
    container.make("answer").expect("answer");
    container.make("answer").expect("cached answer");

    let lines = container.log_output().to_vec();
    assert!(lines.iter().any(|line| line.contains("bind `answer`")));
    assert!(lines.iter().any(|line| line.contains("from cache")));

    container.flush_logs();
    assert!(container.log_output().is_empty());
    container.debug(false);
    container.make("answer").expect("answer");
    assert!(container.log_output().is_empty());
}
