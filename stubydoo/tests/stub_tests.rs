//! Integration tests for method and attribute stubbing.
//!
//! Coverage:
//! - Matching order between filtered and unfiltered records
//! - Handle configuration, re-filtering and removal
//! - Exact restoration of the original object
//! - Plain attribute overrides

use std::cell::Cell;
use std::rc::Rc;
use stubydoo::{
    Arguments, Class, Exception, Matcher, ObjectRef, StubError, Value, args, is_patched, stub,
    stub_attributes, stub_method, unstub, unstub_attributes, unstub_method,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn account_class() -> Rc<Class> {
    Class::builder("Account")
        .attr("currency", "EUR")
        .method("balance", |this, _| this.get_attr("amount"))
        .method("deposit", |this, args| {
            let amount = this.get_attr("amount")?.as_int().unwrap_or(0);
            let delta = args.get(0).and_then(Value::as_int).unwrap_or(0);
            this.set_attr("amount", amount + delta);
            Ok(Value::Int(amount + delta))
        })
        .build()
}

fn account(amount: i64) -> ObjectRef {
    ObjectRef::with_attrs(&account_class(), [("amount", Value::Int(amount))])
}

fn call(o: &ObjectRef, name: &str, args: Arguments) -> Result<Value, StubError> {
    o.call_method(name, &args)
}

// =============================================================================
// Matching Order
// =============================================================================

mod matching_tests {
    use super::*;

    #[test]
    fn test_generic_then_specific() {
        init_tracing();
        let o = account(0);
        stub(&o, "m").and_return(1);
        stub(&o, "m").with_args(args![5]).and_return(2);

        assert_eq!(call(&o, "m", args![]).unwrap(), Value::Int(1));
        assert_eq!(call(&o, "m", args![5]).unwrap(), Value::Int(2));
        assert_eq!(call(&o, "m", args![6]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_specific_survives_later_generic() {
        let o = account(0);
        stub(&o, "m").with_args(args![5]).and_return(2);
        stub(&o, "m").and_return(1);
        assert_eq!(call(&o, "m", args![5]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_generic_override_and_fallback() {
        let o = account(0);
        stub(&o, "m").and_return(1);
        let later = stub(&o, "m").and_return(2);
        assert_eq!(call(&o, "m", args![]).unwrap(), Value::Int(2));

        later.unset();
        assert_eq!(call(&o, "m", args![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_identical_filter_replaces() {
        let o = account(0);
        stub(&o, "m").with_args(args![1]).and_return("first");
        stub(&o, "m").with_args(args![2]).and_return("second");
        stub(&o, "m").with_args(args![1]).and_return("replaced");

        assert_eq!(call(&o, "m", args![1]).unwrap(), Value::from("replaced"));
        assert_eq!(call(&o, "m", args![2]).unwrap(), Value::from("second"));
    }

    #[test]
    fn test_keyword_filter() {
        let o = account(0);
        stub(&o, "find")
            .with_kwargs([("name", Value::from("bob"))])
            .and_return(7);
        assert_eq!(call(&o, "find", args![; name = "bob"]).unwrap(), Value::Int(7));
        assert!(matches!(
            call(&o, "find", args![; name = "eve"]),
            Err(StubError::UnexpectedCall { .. })
        ));
        assert!(call(&o, "find", args!["x"; name = "bob"]).is_err());
    }

    #[test]
    fn test_with_kwargs_keeps_positional_filter() {
        let o = account(0);
        let handle = stub(&o, "find")
            .with_args(args![1])
            .with_kwargs([("page", Value::from(2))])
            .and_return("hit");
        assert_eq!(handle.filter(), Some(args![1; page = 2]));
        assert_eq!(call(&o, "find", args![1; page = 2]).unwrap(), Value::from("hit"));
    }

    #[test]
    fn test_keyword_matcher_filter() {
        struct HasKey(&'static str);

        impl Matcher for HasKey {
            fn matches(&self, actual: &Value) -> bool {
                actual.as_dict().is_some_and(|d| d.contains_key(self.0))
            }

            fn describe(&self) -> String {
                format!("has {}", self.0)
            }
        }

        let o = account(0);
        stub(&o, "log").with_kwargs(Value::matcher(HasKey("level"))).and_return(true);
        assert_eq!(
            call(&o, "log", args![; level = "info", msg = "x"]).unwrap(),
            Value::Bool(true)
        );
        assert!(call(&o, "log", args![; msg = "x"]).is_err());
    }

    #[test]
    fn test_unexpected_call_message() {
        let o = account(0);
        stub(&o, "fetch").with_args(args!["a"]);
        let err = call(&o, "fetch", args!["b"; retry = true]).unwrap_err();
        assert_eq!(err.to_string(), "unexpected call: fetch('b', retry=True)");
        assert!(err.is_expectation_failure());
    }
}

// =============================================================================
// Handle Configuration
// =============================================================================

mod handle_tests {
    use super::*;

    #[test]
    fn test_with_args_refiles_record() {
        let o = account(0);
        let handle = stub(&o, "m").and_return(1);
        assert_eq!(call(&o, "m", args![9]).unwrap(), Value::Int(1));

        let handle = handle.with_args(args![1]);
        assert!(call(&o, "m", args![9]).is_err());
        assert_eq!(call(&o, "m", args![1]).unwrap(), Value::Int(1));

        handle.with_any_args();
        assert_eq!(call(&o, "m", args![9]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_and_run_receives_arguments() {
        let o = account(0);
        stub(&o, "sum").and_run(|args| {
            let total: i64 = args.positional().iter().filter_map(Value::as_int).sum();
            let bonus = args.get_kw("bonus").and_then(Value::as_int).unwrap_or(0);
            Ok(Value::Int(total + bonus))
        });
        assert_eq!(call(&o, "sum", args![1, 2, 3; bonus = 10]).unwrap(), Value::Int(16));
    }

    #[test]
    fn test_and_raise() {
        let o = account(0);
        stub(&o, "withdraw")
            .and_raise(Exception::new("InsufficientFunds").with_arguments(args!["a1"; code = 4]));
        let err = call(&o, "withdraw", args![100]).unwrap_err();
        let exc = err.exception().unwrap();
        assert!(exc.is("InsufficientFunds"));
        assert_eq!(exc.args(), &[Value::from("a1")]);
        assert_eq!(exc.kwargs().get("code"), Some(&Value::Int(4)));
        assert!(!err.is_assertion());
    }

    #[test]
    fn test_and_yield_restarts() {
        let o = account(0);
        stub(&o, "rows").and_yield([1, 2, 3]);
        for _ in 0..2 {
            let rows = call(&o, "rows", args![]).unwrap().collect_items().unwrap();
            assert_eq!(rows, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        }
    }

    #[test]
    fn test_and_yield_from_producer() {
        let o = account(0);
        stub(&o, "range").and_yield_from(|args| {
            let n = args.get(0).and_then(Value::as_int).unwrap_or(0);
            Ok(Value::iter((0..n).map(Value::Int)))
        });
        let items = call(&o, "range", args![3]).unwrap().collect_items().unwrap();
        assert_eq!(items, vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_callback_may_reenter() {
        let o = account(0);
        let inner = o.clone();
        stub(&o, "outer").and_run(move |_| inner.call_method("inner", &args![]));
        stub(&o, "inner").and_return("deep");
        assert_eq!(call(&o, "outer", args![]).unwrap(), Value::from("deep"));
    }

    #[test]
    fn test_callback_may_unstub_itself() {
        let o = account(5);
        let target = o.clone();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        stub(&o, "balance").and_run(move |_| {
            seen.set(seen.get() + 1);
            unstub_method(&target, "balance");
            Ok(Value::Int(-1))
        });
        assert_eq!(call(&o, "balance", args![]).unwrap(), Value::Int(-1));
        assert_eq!(call(&o, "balance", args![]).unwrap(), Value::Int(5));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_mutating_after_unset_does_not_reattach() {
        let o = account(0);
        let handle = stub(&o, "m").and_return(1);
        handle.unset();
        assert!(!handle.is_active());
        let handle = handle.and_return(2).with_args(args![1]);
        assert!(!handle.is_active());
        assert!(!is_patched(&o));
    }
}

// =============================================================================
// Restoration
// =============================================================================

mod restoration_tests {
    use super::*;

    #[test]
    fn test_stub_then_unstub_restores_everything() {
        let o = account(10);
        let original_class = o.class();

        for _ in 0..3 {
            stub(&o, "balance").and_return(0);
            stub(&o, "deposit").with_args(args![1]).and_return(0);
            assert_eq!(call(&o, "balance", args![]).unwrap(), Value::Int(0));
            assert!(is_patched(&o));

            unstub(&o.bound_method("balance").unwrap());
            assert!(is_patched(&o));
            unstub_method(&o, "deposit");

            assert!(!is_patched(&o));
            assert!(Rc::ptr_eq(&o.class(), &original_class));
            assert_eq!(o.extension_count(), 0);
            assert_eq!(o.attr_names(), vec!["amount".to_string()]);
            assert_eq!(call(&o, "balance", args![]).unwrap(), Value::Int(10));
        }
    }

    #[test]
    fn test_unset_last_record_restores() {
        let o = account(3);
        let a = stub(&o, "balance").and_return(1);
        let b = stub(&o, "balance").with_args(args![1]).and_return(2);
        a.unset();
        assert!(is_patched(&o));
        b.unset();
        assert!(!is_patched(&o));
        assert_eq!(call(&o, "balance", args![]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_unknown_method_is_missing_again() {
        let o = account(0);
        stub(&o, "fly").and_return(true);
        assert!(o.has_attr("fly"));
        unstub_method(&o, "fly");
        assert!(!o.has_attr("fly"));
        assert!(matches!(
            call(&o, "fly", args![]),
            Err(StubError::AttributeError { .. })
        ));
    }

    #[test]
    fn test_siblings_unaffected() {
        let class = account_class();
        let a = ObjectRef::with_attrs(&class, [("amount", Value::Int(1))]);
        let b = ObjectRef::with_attrs(&class, [("amount", Value::Int(2))]);
        stub(&a, "balance").and_return(100);
        assert_eq!(call(&a, "balance", args![]).unwrap(), Value::Int(100));
        assert_eq!(call(&b, "balance", args![]).unwrap(), Value::Int(2));
        assert!(!is_patched(&b));
    }

    #[test]
    fn test_stub_dunder_call() {
        let o = account(0);
        stub(&o, "__call__").and_return("called");
        assert_eq!(o.call(&args![]).unwrap(), Value::from("called"));
        assert_eq!(Value::from(&o).call(&args![1]).unwrap(), Value::from("called"));
    }

    #[test]
    fn test_stub_through_method_reference() {
        let o = account(4);
        let deposit = o.bound_method("deposit").unwrap();
        stub_method(&deposit).with_args(args![1]).and_return(-1);
        assert_eq!(deposit.call(&args![1]).unwrap(), Value::Int(-1));
        unstub(&deposit);
        assert_eq!(deposit.call(&args![1]).unwrap(), Value::Int(5));
    }
}

// =============================================================================
// Attributes
// =============================================================================

mod attribute_tests {
    use super::*;

    #[test]
    fn test_stub_and_restore_attributes() {
        let o = account(10);
        stub_attributes(
            &o,
            [("amount", Value::Int(99)), ("owner", Value::from("zoe"))],
        );
        assert_eq!(call(&o, "balance", args![]).unwrap(), Value::Int(99));
        assert_eq!(o.get_attr("owner").unwrap(), Value::from("zoe"));

        unstub_attributes(&o, ["amount", "owner"]);
        assert_eq!(o.get_attr("amount").unwrap(), Value::Int(10));
        assert!(!o.has_attr("owner"));
    }

    #[test]
    fn test_class_attribute_shadow_is_removed() {
        let o = account(0);
        stub_attributes(&o, [("currency", Value::from("USD"))]);
        assert_eq!(o.get_attr("currency").unwrap(), Value::from("USD"));
        unstub_attributes(&o, ["currency"]);
        assert_eq!(o.get_attr("currency").unwrap(), Value::from("EUR"));
        assert!(o.own_attr("currency").is_none());
    }

    #[test]
    fn test_restores_first_original() {
        let o = account(1);
        stub_attributes(&o, [("amount", Value::Int(2))]);
        stub_attributes(&o, [("amount", Value::Int(3))]);
        unstub_attributes(&o, ["amount"]);
        assert_eq!(o.get_attr("amount").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_unstub_unknown_names_is_silent() {
        let o = account(1);
        unstub_attributes(&o, ["amount", "nothing"]);
        assert_eq!(o.get_attr("amount").unwrap(), Value::Int(1));
        assert_eq!(o.extension_count(), 0);
    }

    #[test]
    fn test_attributes_independent_of_methods() {
        let o = account(1);
        stub_attributes(&o, [("amount", Value::Int(2))]);
        stub(&o, "balance").and_return(0);
        unstub_method(&o, "balance");
        assert_eq!(o.get_attr("amount").unwrap(), Value::Int(2));
        unstub_attributes(&o, ["amount"]);
        assert_eq!(o.get_attr("amount").unwrap(), Value::Int(1));
    }
}
