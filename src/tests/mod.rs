//! Cross-module scenarios driving account loops and the scheduler against
//! the mock chain client.
