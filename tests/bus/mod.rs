//! Line bus tests.

mod line_bus_test;
