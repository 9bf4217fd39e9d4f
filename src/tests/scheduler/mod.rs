// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::scheduler::*;
use anyhow::{bail, Result};

fn make_info<'a>(inputs: &[&'a str], outputs: &[&'a str]) -> BuildInfo<'a> {
    BuildInfo {
        inputs: inputs.to_vec(),
        outputs: outputs.to_vec(),
    }
}

fn check_order(builds: &[&str], infos: &[BuildInfo<'_>], expected: &[&str]) -> Result<()> {
    match schedule(infos)? {
        SortResult::Order(order) => {
            let actual: Vec<&str> = order.iter().map(|idx| builds[*idx]).collect();
            for (a, e) in actual.iter().zip(expected.iter()) {
                println!("{a:30}{e}");
            }
            assert_eq!(actual, expected);
            Ok(())
        }
        r => bail!("scheduling failed: {r:?}"),
    }
}

#[test]
fn insertion_order_when_independent() -> Result<()> {
    let builds = ["cc a.c", "cc b.c", "cc c.c"];
    let infos = [
        make_info(&["a.c"], &["a.o"]),
        make_info(&["b.c"], &["b.o"]),
        make_info(&["c.c"], &["c.o"]),
    ];
    check_order(&builds, &infos, &builds)
}

#[test]
fn producers_first() -> Result<()> {
    let builds = [
        "link app",
        "cc main.c",
        "generate config.h",
        "cc util.c",
        "archive libutil.a",
    ];
    let infos = [
        make_info(&["main.o", "libutil.a"], &["app"]),
        make_info(&["main.c", "config.h"], &["main.o"]),
        make_info(&["config.h.in"], &["config.h"]),
        make_info(&["util.c", "config.h"], &["util.o"]),
        make_info(&["util.o"], &["libutil.a"]),
    ];
    let expected = [
        "generate config.h",
        "cc main.c",
        "cc util.c",
        "archive libutil.a",
        "link app",
    ];
    check_order(&builds, &infos, &expected)
}

#[test]
fn cycle() -> Result<()> {
    let infos = [
        make_info(&["src"], &["ok"]),
        make_info(&["y"], &["x"]),
        make_info(&["x"], &["y"]),
    ];
    match schedule(&infos)? {
        SortResult::Cycle(file, stuck) => {
            assert_eq!(stuck, vec![1, 2]);
            assert_eq!(file, "y");
        }
        r => bail!("expected a cycle, got {r:?}"),
    }
    Ok(())
}

#[test]
fn shared_output_is_an_internal_error() {
    let infos = [make_info(&[], &["x"]), make_info(&[], &["x"])];
    assert!(schedule(&infos).is_err());
}

#[test]
fn empty() -> Result<()> {
    assert_eq!(schedule(&[])?, SortResult::Order(vec![]));
    Ok(())
}
