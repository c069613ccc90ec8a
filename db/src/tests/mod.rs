mod progression_tests;
