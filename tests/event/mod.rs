//! Event classification and fan-out tests.

mod classifier_test;
mod pipeline_test;
