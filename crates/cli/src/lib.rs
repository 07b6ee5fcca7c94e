//! `osb-cli`: the `osbctl` command-line front end for `osb-client`.

pub mod cli;
